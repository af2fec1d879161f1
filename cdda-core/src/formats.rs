// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module enumerates the container formats and payload codecs known to the
//! selection engine.

use std::fmt;

/// A container format.
///
/// A format is either an audio format that carries an encoded audio stream, or a metadata format
/// that carries a table of contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Unknown,
    /// CUE sheet.
    Cue,
    /// cdrdao TOC file.
    Cdrdao,
    /// RIFF/WAVE.
    Wav,
    /// Native FLAC stream.
    Flac,
    /// Monkey's Audio.
    Ape,
    /// Core Audio Format.
    Caf,
    /// MPEG-4 audio (ISO base media file format).
    M4a,
    /// Ogg.
    Ogg,
    /// WavPack.
    Wv,
    /// Audio Interchange File Format.
    Aiff,
}

impl Format {
    /// Returns `true` if the format carries audio, `false` if it carries metadata only.
    pub fn is_audio(&self) -> bool {
        !matches!(self, Format::Unknown | Format::Cue | Format::Cdrdao)
    }

    /// Gets the name of the format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Unknown => "unknown",
            Format::Cue => "cue",
            Format::Cdrdao => "cdrdao",
            Format::Wav => "wav",
            Format::Flac => "fLaC",
            Format::Ape => "APE",
            Format::Caf => "CAF",
            Format::M4a => "M4A",
            Format::Ogg => "OGG",
            Format::Wv => "WV",
            Format::Aiff => "AIFF",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A payload codec of an audio format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Unknown,
    PcmS16Be,
    PcmS16BePlanar,
    PcmS16Le,
    PcmS16LePlanar,
    PcmS32Be,
    PcmS32BePlanar,
    PcmS32Le,
    PcmS32LePlanar,
    Flac,
    Wavpack,
    Monkey,
    Alac,
    /// No codec, i.e. the format is a metadata format.
    None,
}

impl Codec {
    /// Gets the name of the codec.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Unknown => "unknown",
            Codec::PcmS16Be => "PCM_S16BE",
            Codec::PcmS16BePlanar => "PCM_S16BE_PLANAR",
            Codec::PcmS16Le => "PCM_S16LE",
            Codec::PcmS16LePlanar => "PCM_S16LE_PLANAR",
            Codec::PcmS32Be => "PCM_S32BE",
            Codec::PcmS32BePlanar => "PCM_S32BE_PLANAR",
            Codec::PcmS32Le => "PCM_S32LE",
            Codec::PcmS32LePlanar => "PCM_S32LE_PLANAR",
            Codec::Flac => "FLAC",
            Codec::Wavpack => "WAVPACK",
            Codec::Monkey => "MONKEY",
            Codec::Alac => "ALAC",
            Codec::None => "none",
        }
    }

    /// Returns `true` if the codec stores uncompressed PCM.
    pub fn is_pcm(&self) -> bool {
        matches!(
            self,
            Codec::PcmS16Be
                | Codec::PcmS16BePlanar
                | Codec::PcmS16Le
                | Codec::PcmS16LePlanar
                | Codec::PcmS32Be
                | Codec::PcmS32BePlanar
                | Codec::PcmS32Le
                | Codec::PcmS32LePlanar
        )
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
