// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `descriptor` module defines the capability descriptor every reader backend exposes.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::errors::{Error, Result};
use crate::formats::{Codec, Format};
use crate::reader::FileReader;

/// The kind of input a descriptor's reader consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputType {
    /// Encoded audio.
    Audio,
    /// A table of contents.
    Toc,
}

/// An external library a backend is built upon.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Library {
    /// The crate name of the library.
    pub name: &'static str,
    /// The version requirement the backend was compiled against.
    pub version: &'static str,
}

/// A `Descriptor` describes the capabilities of one reader backend and constructs instances of
/// that backend.
///
/// Descriptors are stateless. Two descriptors are equal if they have the same `id`, regardless of
/// where they were instantiated. This allows a descriptor to be removed from a registry using a
/// freshly constructed instance.
pub trait Descriptor: Send + Sync {
    /// A unique, stable identifier of the backend.
    fn id(&self) -> &'static str;

    /// A human-readable name of the backend.
    fn name(&self) -> &'static str;

    /// The formats this backend can read.
    fn formats(&self) -> &'static [Format];

    /// The codecs this backend can decode. Empty for metadata backends.
    fn codecs(&self) -> &'static [Codec];

    /// The kind of reader `create_reader` returns.
    fn input_type(&self) -> InputType;

    /// Returns `true` if `bytes`, read from the file at `offset`, are acceptable for this backend.
    fn accepts_bytes(&self, bytes: &[u8], offset: u64) -> bool;

    /// Returns `true` if the filename is acceptable for this backend.
    fn accepts_name(&self, filename: &str) -> bool;

    /// Returns `true` if the backend can read `format`.
    fn accepts_format(&self, format: Format) -> bool {
        self.formats().contains(&format)
    }

    /// Returns `true` if the backend can decode `codec`.
    fn accepts_codec(&self, codec: Codec) -> bool {
        self.codecs().contains(&codec)
    }

    /// The external libraries the backend is built upon.
    fn libraries(&self) -> &'static [Library] {
        &[]
    }

    /// Instantiates the backend.
    ///
    /// Validation of the input is deferred until a file is opened, so this never fails.
    fn create_reader(&self) -> FileReader;
}

impl<'a> PartialEq for dyn Descriptor + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<'a> Eq for dyn Descriptor + 'a {}

impl<'a> fmt::Debug for dyn Descriptor + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor").field("id", &self.id()).field("name", &self.name()).finish()
    }
}

/// Gets the suffix of `filename`, i.e. everything after the last `delimiter`. Returns `None` if
/// the filename has no such suffix.
pub fn get_suffix(filename: &str, delimiter: char) -> Option<&str> {
    match filename.rfind(delimiter) {
        Some(pos) if pos + 1 < filename.len() => Some(&filename[pos + 1..]),
        _ => None,
    }
}

/// Returns `true` if the suffix of `filename` matches one of `suffixes`, ignoring case.
pub fn ci_match_suffix(suffixes: &[&str], filename: &str) -> bool {
    match get_suffix(filename, '.') {
        Some(suffix) => suffixes.iter().any(|s| s.eq_ignore_ascii_case(suffix)),
        None => false,
    }
}

/// Reads exactly `length` bytes from the file at `path`, starting at `offset`.
pub fn read_bytes(path: &Path, offset: u64, length: usize) -> Result<Vec<u8>> {
    debug!("reading {} bytes at offset {} from {}", length, offset, path.display());

    let mut file = File::open(path).map_err(|err| Error::ReadError { err, pos: 0 })?;

    file.seek(SeekFrom::Start(offset)).map_err(|err| Error::ReadError { err, pos: 0 })?;

    let mut buf = vec![0u8; length];
    let mut read = 0;

    while read < length {
        match file.read(&mut buf[read..]) {
            Ok(0) => {
                let err = std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected end of file",
                );
                return Err(Error::ReadError { err, pos: read as u64 });
            }
            Ok(n) => read += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::ReadError { err, pos: read as u64 }),
        }
    }

    Ok(buf)
}
