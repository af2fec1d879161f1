// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audio readers built upon the demuxers and decoders of [Symphonia](https://docs.rs/symphonia).
//!
//! Two descriptors are provided. [`FlacDescriptor`] accepts native FLAC streams only, and drives
//! the FLAC demuxer and decoder without probing.
//! [`SymphoniaDescriptor`] accepts every container the Symphonia build supports, as long as the
//! stream is encoded with a lossless codec, and is meant to be registered last.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use cdda_core::descriptor::{ci_match_suffix, Descriptor, InputType, Library};
use cdda_core::formats::{Codec, Format};
use cdda_core::reader::FileReader;

mod reader;

pub use reader::{
    map_codec, map_error, select_track, Backend, SymphoniaDecoder, SymphoniaDemuxer,
    SymphoniaReader,
};

const LIBRARIES: &[Library] = &[Library { name: "symphonia", version: "0.5.4" }];

const FLAC_CODECS: &[Codec] = &[Codec::Flac];

const GENERIC_CODECS: &[Codec] = &[
    Codec::PcmS16Le,
    Codec::PcmS16LePlanar,
    Codec::PcmS16Be,
    Codec::PcmS16BePlanar,
    Codec::Flac,
    Codec::Alac,
];

/// Describes the FLAC reader.
#[derive(Copy, Clone, Debug, Default)]
pub struct FlacDescriptor;

impl Descriptor for FlacDescriptor {
    fn id(&self) -> &'static str {
        "flac"
    }

    fn name(&self) -> &'static str {
        "FLAC"
    }

    fn formats(&self) -> &'static [Format] {
        &[Format::Flac]
    }

    fn codecs(&self) -> &'static [Codec] {
        FLAC_CODECS
    }

    fn input_type(&self) -> InputType {
        InputType::Audio
    }

    fn accepts_bytes(&self, bytes: &[u8], offset: u64) -> bool {
        offset == 0 && bytes.starts_with(b"fLaC")
    }

    fn accepts_name(&self, filename: &str) -> bool {
        ci_match_suffix(&["flac"], filename)
    }

    fn libraries(&self) -> &'static [Library] {
        LIBRARIES
    }

    fn create_reader(&self) -> FileReader {
        FileReader::Audio(Box::new(SymphoniaReader::flac(Default::default())))
    }
}

const SUFFIXES: &[&str] =
    &["wav", "wave", "flac", "aiff", "aif", "aifc", "caf", "m4a", "mp4", "ogg", "oga"];

/// Describes the generic reader for all containers of the Symphonia build.
#[derive(Copy, Clone, Debug, Default)]
pub struct SymphoniaDescriptor;

/// Returns `true` if `bytes` start with the marker of a container the generic reader supports.
fn is_supported_container(bytes: &[u8]) -> bool {
    if bytes.len() < 12 {
        return false;
    }

    let riff = &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE";
    let aiff = &bytes[0..4] == b"FORM" && (&bytes[8..12] == b"AIFF" || &bytes[8..12] == b"AIFC");
    let isomp4 = &bytes[4..8] == b"ftyp";

    let markers: [&[u8]; 3] = [b"fLaC", b"caff", b"OggS"];
    let native = markers.iter().any(|marker| bytes.starts_with(marker));

    riff || aiff || isomp4 || native
}

impl Descriptor for SymphoniaDescriptor {
    fn id(&self) -> &'static str {
        "symphonia"
    }

    fn name(&self) -> &'static str {
        "Symphonia (lossless)"
    }

    fn formats(&self) -> &'static [Format] {
        &[Format::Wav, Format::Flac, Format::Aiff, Format::Caf, Format::M4a, Format::Ogg]
    }

    fn codecs(&self) -> &'static [Codec] {
        GENERIC_CODECS
    }

    fn input_type(&self) -> InputType {
        InputType::Audio
    }

    fn accepts_bytes(&self, bytes: &[u8], offset: u64) -> bool {
        offset == 0 && is_supported_container(bytes)
    }

    fn accepts_name(&self, filename: &str) -> bool {
        ci_match_suffix(SUFFIXES, filename)
    }

    fn libraries(&self) -> &'static [Library] {
        LIBRARIES
    }

    fn create_reader(&self) -> FileReader {
        FileReader::Audio(Box::new(SymphoniaReader::new(Default::default(), GENERIC_CODECS)))
    }
}
