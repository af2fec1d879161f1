// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `toc` module provides the table of contents of a compact disc.
//!
//! Table of contents parsers feed a [`TocBuilder`] with the values they encounter, one track
//! after another. [`TocBuilder::build`] validates the values and yields a [`Toc`].

use log::debug;

use crate::errors::{invalid_toc_error, Result};

/// The number of frames per second.
pub const FRAMES_PER_SECOND: u32 = 75;

/// The maximum number of tracks of a compact disc.
pub const MAX_TRACKS: usize = 99;

/// Converts a minute, second, frame timestamp to a count of frames.
///
/// Returns `None` unless `m <= 99`, `s < 60` and `f < 75`.
pub fn msf_to_frames(m: u32, s: u32, f: u32) -> Option<u32> {
    if m > 99 || s >= 60 || f >= FRAMES_PER_SECOND {
        return None;
    }
    Some((m * 60 + s) * FRAMES_PER_SECOND + f)
}

/// Returns `true` if `mcn` is a valid media catalog number, i.e. 13 digits.
pub fn is_valid_mcn(mcn: &str) -> bool {
    mcn.len() == 13 && mcn.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` if `isrc` is a valid international standard recording code.
///
/// An ISRC has 12 characters: two for the country and three for the owner, both alphanumeric,
/// followed by two digits for the year and five for the serial number.
pub fn is_valid_isrc(isrc: &str) -> bool {
    let bytes = isrc.as_bytes();

    bytes.len() == 12
        && bytes[..5].iter().all(|b| b.is_ascii_alphanumeric())
        && bytes[5..].iter().all(|b| b.is_ascii_digit())
}

/// Returns `true` if `disc_id` is a valid disc id, i.e. at most 8 alphanumeric characters.
pub fn is_valid_disc_id(disc_id: &str) -> bool {
    disc_id.len() <= 8 && disc_id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// One track of a [`Toc`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocTrack {
    /// The offset of the first frame of the track.
    pub offset: u32,
    /// The length of the track in frames, if known.
    pub length: Option<u32>,
    /// The name of the audio file containing the track, if any.
    pub filename: Option<String>,
    pub isrc: Option<String>,
}

/// The table of contents of a compact disc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toc {
    tracks: Vec<TocTrack>,
    leadout: Option<u32>,
    mcn: Option<String>,
    disc_id: Option<String>,
}

impl Toc {
    /// The tracks in ascending order of their offsets.
    pub fn tracks(&self) -> &[TocTrack] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// The offsets of all tracks in frames.
    pub fn offsets(&self) -> Vec<u32> {
        self.tracks.iter().map(|t| t.offset).collect()
    }

    /// The distinct audio filenames in order of first appearance.
    pub fn filenames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.tracks.iter().filter_map(|t| t.filename.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// The offset of the leadout in frames, if known.
    pub fn leadout(&self) -> Option<u32> {
        self.leadout
    }

    /// Returns `true` if the leadout is known, i.e. the length of every track is known.
    pub fn is_complete(&self) -> bool {
        self.leadout.is_some()
    }

    pub fn mcn(&self) -> Option<&str> {
        self.mcn.as_deref()
    }

    pub fn disc_id(&self) -> Option<&str> {
        self.disc_id.as_deref()
    }
}

#[derive(Default)]
struct PendingTrack {
    offset: Option<u32>,
    length: Option<u32>,
    filename: Option<String>,
    isrc: Option<String>,
}

/// `TocBuilder` accumulates the values of a table of contents while it is parsed.
///
/// Values of tracks are set on the current track, a new track is started with
/// [`TocBuilder::start_track`].
#[derive(Default)]
pub struct TocBuilder {
    tracks: Vec<PendingTrack>,
    leadout: Option<u32>,
    mcn: Option<String>,
    disc_id: Option<String>,
}

impl TocBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts a new track. Returns its 1-based number.
    pub fn start_track(&mut self) -> usize {
        self.tracks.push(Default::default());
        self.tracks.len()
    }

    /// The 1-based number of the current track, or 0 if no track was started.
    pub fn current_track(&self) -> usize {
        self.tracks.len()
    }

    fn current(&mut self) -> Option<&mut PendingTrack> {
        self.tracks.last_mut()
    }

    /// Sets the offset of the current track.
    pub fn set_offset(&mut self, frames: u32) -> Result<()> {
        match self.current() {
            Some(track) => track.offset = Some(frames),
            None => return invalid_toc_error("offset outside of a track"),
        }
        Ok(())
    }

    /// Sets the length of the current track.
    pub fn set_length(&mut self, frames: u32) -> Result<()> {
        match self.current() {
            Some(track) => track.length = Some(frames),
            None => return invalid_toc_error("length outside of a track"),
        }
        Ok(())
    }

    /// Sets the audio file of the current track.
    pub fn set_filename(&mut self, filename: &str) -> Result<()> {
        match self.current() {
            Some(track) => track.filename = Some(filename.to_string()),
            None => return invalid_toc_error("filename outside of a track"),
        }
        Ok(())
    }

    /// Sets the ISRC of the current track.
    pub fn set_isrc(&mut self, isrc: &str) -> Result<()> {
        if !is_valid_isrc(isrc) {
            return invalid_toc_error("malformed isrc");
        }
        match self.current() {
            Some(track) => track.isrc = Some(isrc.to_string()),
            None => return invalid_toc_error("isrc outside of a track"),
        }
        Ok(())
    }

    pub fn set_mcn(&mut self, mcn: &str) -> Result<()> {
        if !is_valid_mcn(mcn) {
            return invalid_toc_error("malformed mcn");
        }
        self.mcn = Some(mcn.to_string());
        Ok(())
    }

    pub fn set_disc_id(&mut self, disc_id: &str) -> Result<()> {
        if !is_valid_disc_id(disc_id) {
            return invalid_toc_error("malformed disc id");
        }
        self.disc_id = Some(disc_id.to_string());
        Ok(())
    }

    pub fn set_leadout(&mut self, frames: u32) {
        self.leadout = Some(frames);
    }

    /// Validates the accumulated values and builds the table of contents.
    pub fn build(self) -> Result<Toc> {
        if self.tracks.is_empty() {
            return invalid_toc_error("no tracks");
        }

        if self.tracks.len() > MAX_TRACKS {
            return invalid_toc_error("more than 99 tracks");
        }

        let mut tracks = Vec::with_capacity(self.tracks.len());

        for pending in self.tracks {
            let Some(offset) = pending.offset
            else {
                return invalid_toc_error("track without offset");
            };

            if let Some(prev) = tracks.last().map(|t: &TocTrack| t.offset) {
                if offset <= prev {
                    return invalid_toc_error("track offsets are not ascending");
                }
            }

            tracks.push(TocTrack {
                offset,
                length: pending.length,
                filename: pending.filename,
                isrc: pending.isrc,
            });
        }

        if let (Some(leadout), Some(last)) = (self.leadout, tracks.last()) {
            if leadout <= last.offset {
                return invalid_toc_error("leadout does not follow the last track");
            }
        }

        // A track without an explicit length ends where the next one starts, the last one at the
        // leadout.
        let ends: Vec<Option<u32>> =
            tracks.iter().skip(1).map(|t| Some(t.offset)).chain([self.leadout]).collect();

        for (track, end) in tracks.iter_mut().zip(ends) {
            if track.length.is_none() {
                track.length = end.map(|end| end - track.offset);
            }
        }

        debug!("mcn: {}", self.mcn.as_deref().unwrap_or("(none)"));
        debug!("disc id: {}", self.disc_id.as_deref().unwrap_or("(none)"));
        debug!("total tracks: {}", tracks.len());

        for (i, track) in tracks.iter().enumerate() {
            match &track.isrc {
                Some(isrc) => debug!("offset {:2}: {:6}, isrc: {}", i + 1, track.offset, isrc),
                None => debug!("offset {:2}: {:6}", i + 1, track.offset),
            }
        }

        Ok(Toc { tracks, leadout: self.leadout, mcn: self.mcn, disc_id: self.disc_id })
    }
}
