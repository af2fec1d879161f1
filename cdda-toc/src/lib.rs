// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table of contents parsers for CUE sheets and cdrdao TOC files.
//!
//! Table of contents files are plain text without a reliable signature, so the descriptors of
//! this crate accept any bytes and select files by their name.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use cdda_core::descriptor::{ci_match_suffix, Descriptor, InputType};
use cdda_core::formats::{Codec, Format};
use cdda_core::reader::FileReader;

mod cdrdao;
mod cue;
mod lexer;

pub use cdrdao::CdrdaoParser;
pub use cue::CueParser;

/// Describes the CUE sheet parser.
#[derive(Copy, Clone, Debug, Default)]
pub struct CueDescriptor;

impl Descriptor for CueDescriptor {
    fn id(&self) -> &'static str {
        "cue"
    }

    fn name(&self) -> &'static str {
        "CUE sheet"
    }

    fn formats(&self) -> &'static [Format] {
        &[Format::Cue]
    }

    fn codecs(&self) -> &'static [Codec] {
        &[]
    }

    fn input_type(&self) -> InputType {
        InputType::Toc
    }

    fn accepts_bytes(&self, _: &[u8], _: u64) -> bool {
        true
    }

    fn accepts_name(&self, filename: &str) -> bool {
        ci_match_suffix(&["cue"], filename)
    }

    fn create_reader(&self) -> FileReader {
        FileReader::Toc(Box::new(CueParser::new()))
    }
}

/// Describes the cdrdao TOC file parser.
#[derive(Copy, Clone, Debug, Default)]
pub struct CdrdaoDescriptor;

impl Descriptor for CdrdaoDescriptor {
    fn id(&self) -> &'static str {
        "cdrdao"
    }

    fn name(&self) -> &'static str {
        "cdrdao TOC"
    }

    fn formats(&self) -> &'static [Format] {
        &[Format::Cdrdao]
    }

    fn codecs(&self) -> &'static [Codec] {
        &[]
    }

    fn input_type(&self) -> InputType {
        InputType::Toc
    }

    fn accepts_bytes(&self, _: &[u8], _: u64) -> bool {
        true
    }

    fn accepts_name(&self, filename: &str) -> bool {
        ci_match_suffix(&["toc"], filename)
    }

    fn create_reader(&self) -> FileReader {
        FileReader::Toc(Box::new(CdrdaoParser::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_descriptors() {
        assert!(CueDescriptor.accepts_name("Album.CUE"));
        assert!(!CueDescriptor.accepts_name("Album.toc"));
        assert!(CdrdaoDescriptor.accepts_name("album.toc"));
        assert!(!CdrdaoDescriptor.accepts_name("album.cue"));

        assert!(!CueDescriptor.accepts_codec(Codec::None));
        assert!(!Format::Cue.is_audio());
        assert!(CueDescriptor.accepts_format(Format::Cue));

        assert_eq!(CueDescriptor.input_type(), InputType::Toc);
        assert_eq!(CdrdaoDescriptor.create_reader().input_type(), InputType::Toc);
    }
}
