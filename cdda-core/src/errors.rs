// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

use crate::profile::Violations;

/// `Error` provides an enumeration of all possible errors reported while selecting, opening, or
/// decoding an input file.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading the file.
    IoError(io::Error),
    /// An IO error occured while reading a byte window from the file. `pos` is the number of bytes
    /// that could be read before the failure.
    ReadError { err: io::Error, pos: u64 },
    /// No registered descriptor accepted the file.
    InputFormat(String),
    /// An unsupported container, codec, or sample format was encountered.
    Unsupported(&'static str),
    /// The stream is readable but does not conform to the CDDA profile.
    InvalidAudio(Violations),
    /// The container does not contain an audio stream.
    NoAudioStream,
    /// The container contains an audio stream, but no decoder could be found for its codec.
    NoDecoder,
    /// The stream contained malformed data and could not be decoded or demuxed.
    DecodeError(&'static str),
    /// A table of contents could be read but its content is inconsistent.
    InvalidToc(&'static str),
    /// A table of contents file could not be parsed.
    ParseError { line: usize, reason: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::ReadError { ref err, pos } => {
                write!(f, "read error after {} bytes: {}", pos, err)
            }
            Error::InputFormat(ref name) => {
                write!(f, "no matching format for file: {}", name)
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::InvalidAudio(ref violations) => {
                write!(f, "not cdda: {}", violations)
            }
            Error::NoAudioStream => {
                write!(f, "no audio stream")
            }
            Error::NoDecoder => {
                write!(f, "no decoder for audio stream")
            }
            Error::DecodeError(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::InvalidToc(msg) => {
                write!(f, "invalid toc: {}", msg)
            }
            Error::ParseError { line, reason } => {
                write!(f, "parse error on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::ReadError { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an unsupport feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create an invalid audio error.
pub fn invalid_audio_error<T>(violations: Violations) -> Result<T> {
    Err(Error::InvalidAudio(violations))
}

/// Convenience function to create an invalid toc error.
pub fn invalid_toc_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidToc(desc))
}

/// Convenience function to create a parse error.
pub fn parse_error<T>(line: usize, reason: &'static str) -> Result<T> {
    Err(Error::ParseError { line, reason })
}

/// Returns `true` if the error is an IO error signalling the end of the stream.
pub fn is_end_of_stream(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::UnexpectedEof
}
