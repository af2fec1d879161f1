// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;
use std::path::Path;

use cdda_core::errors::{parse_error, Result};
use cdda_core::toc::msf_to_frames;

/// Reads a table of contents file. Files are not required to be UTF-8, invalid sequences are
/// replaced.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;

    // Skip a byte order mark.
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(&bytes);

    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Splits a line into tokens at whitespace. Quoted strings form one token without their quotes.
/// `line` is the 1-based line number reported on error.
pub fn tokenize(text: &str, line: usize) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        }
        else if c == '"' {
            chars.next();

            let mut token = String::new();
            let mut closed = false;

            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                token.push(c);
            }

            if !closed {
                return parse_error(line, "unterminated string");
            }

            tokens.push(token);
        }
        else {
            let mut token = String::new();

            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }

            tokens.push(token);
        }
    }

    Ok(tokens)
}

/// Parses a `mm:ss:ff` timestamp into a count of frames.
pub fn parse_msf(token: &str) -> Option<u32> {
    let mut parts = token.split(':').map(|p| p.parse::<u32>().ok());

    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Some(m)), Some(Some(s)), Some(Some(f)), None) => msf_to_frames(m, s, f),
        _ => None,
    }
}
