// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # cdda
//!
//! cdda-rs selects and decodes lossless audio files holding compact disc digital audio, and reads
//! the tables of contents that describe how the audio is laid out on the disc. Decoded samples are
//! delivered to a [`SampleSink`](crate::core::sink::SampleSink) as canonical 16-bit left/right
//! stereo samples, together with the exact number of samples in the file.
//!
//! # Usage
//!
//! 1. Get the default audio [`Registry`](crate::core::selection::Registry) with
//!    [`get_audio_registry`](crate::default::get_audio_registry), or construct one and populate it
//!    with [`register_enabled_audio_readers`](crate::default::register_enabled_audio_readers).
//! 2. Select and instantiate a reader for a file with
//!    [`open_audio_reader`](crate::core::reader::open_audio_reader).
//! 3. Call `process_file` with a sink. The sink is told the size declared by the container first,
//!    and the authoritative size before the last block of samples.
//!
//! Tables of contents are read the same way using the toc registry and
//! [`open_toc_parser`](crate::core::reader::open_toc_parser).
//!
//! # Backends
//!
//! | Backend       | Feature Flag | Default |
//! |---------------|--------------|---------|
//! | Native WAV    | `wav`        | Yes     |
//! | Symphonia     | `symphonia`  | Yes     |
//! | CUE / cdrdao  | `toc`        | Yes     |
//!
//! The Symphonia backends decode FLAC, ALAC, and 16-bit PCM in WAV, AIFF, CAF, MP4, and OGG
//! containers. Lossy codecs are never accepted.

pub mod default {
    //! The `default` module provides the registries of all backends enabled by `feature` flags.
    //! Using the `default` module is optional, registries may also be populated by hand.

    pub mod readers {
        //! The `readers` module re-exports the descriptors of all enabled audio backends.

        #[cfg(feature = "wav")]
        pub use cdda_format_wav::WavDescriptor;
        #[cfg(feature = "symphonia")]
        pub use cdda_reader_symphonia::{FlacDescriptor, SymphoniaDescriptor};
    }

    pub mod parsers {
        //! The `parsers` module re-exports the descriptors of all enabled table of contents
        //! backends.

        #[cfg(feature = "toc")]
        pub use cdda_toc::{CdrdaoDescriptor, CueDescriptor};
    }

    use lazy_static::lazy_static;

    use cdda_core::selection::Registry;

    lazy_static! {
        static ref AUDIO_REGISTRY: Registry = {
            let mut registry = Registry::audio();
            register_enabled_audio_readers(&mut registry);
            registry
        };
    }

    lazy_static! {
        static ref TOC_REGISTRY: Registry = {
            let mut registry = Registry::toc();
            register_enabled_toc_parsers(&mut registry);
            registry
        };
    }

    /// Gets the default audio `Registry`. This registry pre-registers all the audio backends
    /// selected by the `feature` flags in the includer's `Cargo.toml`.
    ///
    /// This function is lazy and does not instantiate the `Registry` until the first call to this
    /// function.
    pub fn get_audio_registry() -> &'static Registry {
        &AUDIO_REGISTRY
    }

    /// Gets the default table of contents `Registry`. This registry pre-registers all the table of
    /// contents backends selected by the `feature` flags in the includer's `Cargo.toml`.
    ///
    /// This function is lazy and does not instantiate the `Registry` until the first call to this
    /// function.
    pub fn get_toc_registry() -> &'static Registry {
        &TOC_REGISTRY
    }

    /// Registers all the audio backends selected by the `feature` flags in the includer's
    /// `Cargo.toml` on the provided `Registry`.
    ///
    /// Registration order is priority: the native WAV backend is tried first, then the dedicated
    /// FLAC backend, and the generic Symphonia backend last.
    pub fn register_enabled_audio_readers(registry: &mut Registry) {
        #[cfg(feature = "wav")]
        registry.add_descriptor(Box::new(readers::WavDescriptor));

        #[cfg(feature = "symphonia")]
        registry.add_descriptor(Box::new(readers::FlacDescriptor));

        #[cfg(feature = "symphonia")]
        registry.add_descriptor(Box::new(readers::SymphoniaDescriptor));

        log::debug!("registered {} audio readers", registry.size());
    }

    /// Registers all the table of contents backends selected by the `feature` flags in the
    /// includer's `Cargo.toml` on the provided `Registry`.
    pub fn register_enabled_toc_parsers(registry: &mut Registry) {
        #[cfg(feature = "toc")]
        registry.add_descriptor(Box::new(parsers::CueDescriptor));

        #[cfg(feature = "toc")]
        registry.add_descriptor(Box::new(parsers::CdrdaoDescriptor));

        log::debug!("registered {} toc parsers", registry.size());
    }
}

pub use cdda_core as core;
