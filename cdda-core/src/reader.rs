// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `reader` module defines the readers a descriptor instantiates.

use std::path::Path;

use crate::audio::AudioSize;
use crate::descriptor::InputType;
use crate::errors::{unsupported_error, Error, Result};
use crate::selection::Registry;
use crate::session::SessionOptions;
use crate::sink::SampleSink;
use crate::toc::Toc;

/// The default number of samples a reader reads per packet if the container is not packetized.
pub const DEFAULT_SAMPLES_PER_READ: usize = 4096;

/// `ReaderOptions` is a common set of options that all audio readers use.
#[derive(Copy, Clone, Debug)]
pub struct ReaderOptions {
    /// Options for the decode session.
    pub session: SessionOptions,
    /// The number of samples per packet for containers that store raw PCM.
    pub samples_per_read: usize,
    /// Verify the decoded audio against a checksum embedded in the stream, if supported.
    pub verify: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            session: Default::default(),
            samples_per_read: DEFAULT_SAMPLES_PER_READ,
            verify: false,
        }
    }
}

/// An `AudioReader` decodes audio files into CDDA samples.
pub trait AudioReader {
    /// Opens and validates the file at `path` and returns the size declared by the container,
    /// without decoding it.
    fn acquire_size(&mut self, path: &Path) -> Result<AudioSize>;

    /// Decodes the file at `path` and passes the samples to `sink`. Returns the number of samples
    /// actually decoded.
    fn process_file(&mut self, path: &Path, sink: &mut dyn SampleSink) -> Result<AudioSize>;
}

/// A `TocParser` reads the table of contents of a compact disc from a file.
pub trait TocParser {
    fn parse(&mut self, path: &Path) -> Result<Toc>;
}

/// A reader instantiated by a descriptor.
pub enum FileReader {
    Audio(Box<dyn AudioReader>),
    Toc(Box<dyn TocParser>),
}

impl FileReader {
    pub fn input_type(&self) -> InputType {
        match self {
            FileReader::Audio(_) => InputType::Audio,
            FileReader::Toc(_) => InputType::Toc,
        }
    }
}

/// Selects and instantiates an audio reader for the file at `path`.
pub fn open_audio_reader(registry: &Registry, path: &Path) -> Result<Box<dyn AudioReader>> {
    match registry.for_file(path)? {
        Some(FileReader::Audio(reader)) => Ok(reader),
        Some(FileReader::Toc(_)) => unsupported_error("selected reader does not read audio"),
        None => Err(Error::InputFormat(path.display().to_string())),
    }
}

/// Selects and instantiates a table of contents parser for the file at `path`.
pub fn open_toc_parser(registry: &Registry, path: &Path) -> Result<Box<dyn TocParser>> {
    match registry.for_file(path)? {
        Some(FileReader::Toc(parser)) => Ok(parser),
        Some(FileReader::Audio(_)) => unsupported_error("selected reader does not read a toc"),
        None => Err(Error::InputFormat(path.display().to_string())),
    }
}
