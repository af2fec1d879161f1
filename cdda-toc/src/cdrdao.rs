// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! cdrdao TOC file parser.
//!
//! A track is laid out by its `FILE` or `AUDIOFILE` statement. Tracks are placed one after
//! another, so the offset of a track is the sum of the lengths of all preceding tracks plus its
//! own `START` pregap.

use std::path::Path;

use cdda_core::audio::SAMPLES_PER_FRAME;
use cdda_core::errors::{parse_error, Result};
use cdda_core::reader::TocParser;
use cdda_core::toc::{Toc, TocBuilder};

use log::debug;

use crate::lexer::{parse_msf, read_source, tokenize};

/// Parses a position, either a `mm:ss:ff` timestamp or a count of samples that is a multiple of
/// the frame size.
fn parse_position(token: &str) -> Option<u32> {
    if token.contains(':') {
        return parse_msf(token);
    }

    let samples = token.parse::<u32>().ok()?;

    if samples % SAMPLES_PER_FRAME as u32 != 0 {
        return None;
    }

    Some(samples / SAMPLES_PER_FRAME as u32)
}

/// The layout of the track being parsed.
#[derive(Default)]
struct Layout {
    /// The position of the track on the disc.
    pos: u32,
    length: Option<u32>,
    start: u32,
}

/// `CdrdaoParser` reads the table of contents from a cdrdao TOC file.
#[derive(Default)]
pub struct CdrdaoParser;

impl CdrdaoParser {
    pub fn new() -> Self {
        CdrdaoParser
    }

    /// Parses the text of a TOC file.
    pub fn parse_str(&self, text: &str) -> Result<Toc> {
        let mut builder = TocBuilder::new();
        let mut current: Option<Layout> = None;
        let mut total: u32 = 0;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;

            let line = match line.find("//") {
                Some(pos) => &line[..pos],
                None => line,
            };

            let tokens = tokenize(line, line_no)?;

            let Some((statement, args)) = tokens.split_first()
            else {
                continue;
            };

            match statement.as_str() {
                "CATALOG" => match args {
                    [mcn] => builder.set_mcn(mcn)?,
                    _ => return parse_error(line_no, "CATALOG expects one argument"),
                },
                "TRACK" => {
                    if let Some(layout) = current.take() {
                        total = finish_track(&mut builder, layout, line_no)?;
                    }

                    builder.start_track();
                    current = Some(Layout { pos: total, ..Default::default() });
                }
                "ISRC" => match args {
                    [isrc] if current.is_some() => builder.set_isrc(isrc)?,
                    [_] => return parse_error(line_no, "ISRC outside of a track"),
                    _ => return parse_error(line_no, "ISRC expects one argument"),
                },
                "FILE" | "AUDIOFILE" => {
                    let Some(layout) = current.as_mut()
                    else {
                        return parse_error(line_no, "FILE outside of a track");
                    };

                    let (name, start, length) = match args {
                        [name, start] => (name, start, None),
                        [name, start, length] => (name, start, Some(length)),
                        _ => return parse_error(line_no, "FILE expects a name, start and length"),
                    };

                    if parse_position(start).is_none() {
                        return parse_error(line_no, "malformed file start");
                    }

                    layout.length = match length.map(|l| parse_position(l)) {
                        Some(Some(length)) => Some(layout.length.unwrap_or(0) + length),
                        Some(None) => return parse_error(line_no, "malformed file length"),
                        None => None,
                    };

                    builder.set_filename(name)?;
                }
                "START" => {
                    let Some(layout) = current.as_mut()
                    else {
                        return parse_error(line_no, "START outside of a track");
                    };

                    layout.start = match args {
                        [] => 0,
                        [msf] => match parse_position(msf) {
                            Some(start) => start,
                            None => return parse_error(line_no, "malformed start"),
                        },
                        _ => return parse_error(line_no, "START expects at most one argument"),
                    };
                }
                _ => debug!("cdrdao: ignoring {} at line {}", statement, line_no),
            }
        }

        let line_no = text.lines().count();

        match current.take() {
            Some(layout) if layout.length.is_some() => {
                total = finish_track(&mut builder, layout, line_no)?;
                builder.set_leadout(total);
            }
            Some(layout) => {
                // The last track extends to the end of its file, which is unknown here.
                builder.set_offset(layout.pos + layout.start)?;
            }
            None => (),
        }

        builder.build()
    }
}

/// Sets the offset and length of a finished track and returns the position of the next track.
fn finish_track(builder: &mut TocBuilder, layout: Layout, line_no: usize) -> Result<u32> {
    let Some(length) = layout.length
    else {
        return parse_error(line_no, "track without length");
    };

    if layout.start >= length {
        return parse_error(line_no, "START lies beyond the end of the track");
    }

    builder.set_offset(layout.pos + layout.start)?;
    builder.set_length(length - layout.start)?;

    Ok(layout.pos + length)
}

impl TocParser for CdrdaoParser {
    fn parse(&mut self, path: &Path) -> Result<Toc> {
        debug!("cdrdao: parsing {}", path.display());
        self.parse_str(&read_source(path)?)
    }
}
