// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CUE sheet parser.
//!
//! Only the commands that contribute to the table of contents are interpreted. Track offsets are
//! taken from the `INDEX 01` of each track and refer to the start of the disc image.

use std::path::Path;

use cdda_core::errors::{parse_error, Result};
use cdda_core::reader::TocParser;
use cdda_core::toc::{Toc, TocBuilder};

use log::debug;

use crate::lexer::{parse_msf, read_source, tokenize};

/// `CueParser` reads the table of contents from a CUE sheet.
#[derive(Default)]
pub struct CueParser;

impl CueParser {
    pub fn new() -> Self {
        CueParser
    }

    /// Parses the text of a CUE sheet.
    pub fn parse_str(&self, text: &str) -> Result<Toc> {
        let mut builder = TocBuilder::new();
        let mut file: Option<String> = None;
        let mut has_index = false;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let tokens = tokenize(line, line_no)?;

            let Some((command, args)) = tokens.split_first()
            else {
                continue;
            };

            match command.to_ascii_uppercase().as_str() {
                "CATALOG" => match args {
                    [mcn] => builder.set_mcn(mcn)?,
                    _ => return parse_error(line_no, "CATALOG expects one argument"),
                },
                "FILE" => match args {
                    [name, _] => file = Some(name.clone()),
                    _ => return parse_error(line_no, "FILE expects a name and a type"),
                },
                "TRACK" => {
                    let [number, _mode] = args
                    else {
                        return parse_error(line_no, "TRACK expects a number and a mode");
                    };

                    let Ok(number) = number.parse::<usize>()
                    else {
                        return parse_error(line_no, "malformed track number");
                    };

                    if builder.current_track() > 0 && !has_index {
                        return parse_error(line_no, "previous track has no INDEX 01");
                    }

                    if number != builder.current_track() + 1 {
                        return parse_error(line_no, "track numbers are not consecutive");
                    }

                    builder.start_track();
                    has_index = false;

                    match &file {
                        Some(name) => builder.set_filename(name)?,
                        None => return parse_error(line_no, "TRACK before FILE"),
                    }
                }
                "INDEX" => {
                    let [index, msf] = args
                    else {
                        return parse_error(line_no, "INDEX expects a number and a time");
                    };

                    let Some(frames) = parse_msf(msf)
                    else {
                        return parse_error(line_no, "malformed time");
                    };

                    if builder.current_track() == 0 {
                        return parse_error(line_no, "INDEX before TRACK");
                    }

                    match index.parse::<u32>() {
                        Ok(1) => {
                            builder.set_offset(frames)?;
                            has_index = true;
                        }
                        Ok(_) => debug!("cue: ignoring index {} at line {}", index, line_no),
                        Err(_) => return parse_error(line_no, "malformed index number"),
                    }
                }
                "ISRC" => match args {
                    [isrc] if builder.current_track() > 0 => builder.set_isrc(isrc)?,
                    [_] => return parse_error(line_no, "ISRC before TRACK"),
                    _ => return parse_error(line_no, "ISRC expects one argument"),
                },
                "REM" => {
                    if let [key, value, ..] = args {
                        if key.eq_ignore_ascii_case("DISCID") {
                            builder.set_disc_id(value)?;
                        }
                    }
                }
                _ => debug!("cue: ignoring {} at line {}", command, line_no),
            }
        }

        builder.build()
    }
}

impl TocParser for CueParser {
    fn parse(&mut self, path: &Path) -> Result<Toc> {
        debug!("cue: parsing {}", path.display());
        self.parse_str(&read_source(path)?)
    }
}
