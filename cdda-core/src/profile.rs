// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `profile` module validates audio streams against the CDDA profile and the lossless
//! allow-lists.

use std::fmt;

use log::warn;
use smallvec::SmallVec;

use crate::audio::{SampleFormat, CDDA_BITS_PER_SAMPLE, CDDA_CHANNELS, CDDA_SAMPLE_RATE};
use crate::errors::{invalid_audio_error, unsupported_error, Result};
use crate::formats::Codec;

/// Codecs that are known to reconstruct the original samples bit-exactly.
pub const LOSSLESS_CODECS: &[Codec] = &[
    Codec::PcmS16Le,
    Codec::PcmS16LePlanar,
    Codec::PcmS16Be,
    Codec::PcmS16BePlanar,
    Codec::Flac,
    Codec::Alac,
    Codec::Monkey,
    Codec::Wavpack,
];

/// One violation of the CDDA profile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The stream has the given number of bits per sample instead of 16.
    BitsPerSample(u32),
    /// The stream has the given number of channels instead of 2.
    Channels(u32),
    /// The stream has the given sample rate instead of 44100 Hz.
    SampleRate(u32),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Violation::BitsPerSample(bits) => {
                write!(f, "{} bits per sample, expected {}", bits, CDDA_BITS_PER_SAMPLE)
            }
            Violation::Channels(n) => write!(f, "{} channels, expected {}", n, CDDA_CHANNELS),
            Violation::SampleRate(rate) => {
                write!(f, "sample rate of {} Hz, expected {} Hz", rate, CDDA_SAMPLE_RATE)
            }
        }
    }
}

/// All violations found in a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Violations(SmallVec<[Violation; 3]>);

impl Violations {
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, violation: &Violation) -> bool {
        self.0.contains(violation)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            violation.fmt(f)?;
        }
        Ok(())
    }
}

/// The properties of an audio stream relevant to the CDDA profile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamProperties {
    /// The number of significant bits per sample.
    pub bits_per_sample: u32,
    pub channels: u32,
    pub sample_rate: u32,
}

/// Validates `props` against the CDDA profile.
///
/// All properties are checked. On failure, the returned error lists every violation.
pub fn validate_cdda(props: &StreamProperties) -> Result<()> {
    let mut violations = Violations::default();

    if props.bits_per_sample != CDDA_BITS_PER_SAMPLE {
        violations.0.push(Violation::BitsPerSample(props.bits_per_sample));
    }

    if props.channels != CDDA_CHANNELS {
        violations.0.push(Violation::Channels(props.channels));
    }

    if props.sample_rate != CDDA_SAMPLE_RATE {
        violations.0.push(Violation::SampleRate(props.sample_rate));
    }

    if violations.is_empty() {
        return Ok(());
    }

    for violation in violations.iter() {
        warn!("not cdda: {}", violation);
    }

    invalid_audio_error(violations)
}

/// Checks that `codec` is on the lossless allow-list.
pub fn check_codec(codec: Codec) -> Result<()> {
    if LOSSLESS_CODECS.contains(&codec) {
        Ok(())
    }
    else {
        warn!("codec {} is not supported", codec);
        unsupported_error("codec is not lossless or not supported")
    }
}

/// Checks that a decoder producing `format` can be used. Samples narrower than 16 bits and
/// floating point samples cannot be represented, so their formats have no `SampleFormat` and
/// are rejected by the caller with `None`.
pub fn check_sample_format(format: Option<SampleFormat>) -> Result<SampleFormat> {
    match format {
        Some(format) => Ok(format),
        None => unsupported_error("sample format is not supported"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn verify_cdda_passes() {
        let props = StreamProperties { bits_per_sample: 16, channels: 2, sample_rate: 44100 };
        assert!(validate_cdda(&props).is_ok());
    }

    #[test]
    fn verify_all_violations_are_reported() {
        let props = StreamProperties { bits_per_sample: 24, channels: 1, sample_rate: 48000 };

        match validate_cdda(&props) {
            Err(Error::InvalidAudio(violations)) => {
                assert_eq!(violations.len(), 3);
                assert!(violations.contains(&Violation::BitsPerSample(24)));
                assert!(violations.contains(&Violation::Channels(1)));
                assert!(violations.contains(&Violation::SampleRate(48000)));
            }
            _ => panic!("expected invalid audio"),
        }

        let props = StreamProperties { bits_per_sample: 16, channels: 6, sample_rate: 44100 };

        match validate_cdda(&props) {
            Err(Error::InvalidAudio(violations)) => {
                let found: Vec<_> = violations.iter().copied().collect();
                assert_eq!(found, [Violation::Channels(6)]);
                assert_eq!(violations.to_string(), "6 channels, expected 2");
            }
            _ => panic!("expected invalid audio"),
        }
    }

    #[test]
    fn verify_codec_allow_list() {
        assert!(check_codec(Codec::Flac).is_ok());
        assert!(check_codec(Codec::PcmS16Be).is_ok());
        assert!(check_codec(Codec::Alac).is_ok());
        assert!(matches!(check_codec(Codec::PcmS32Le), Err(Error::Unsupported(_))));
        assert!(matches!(check_codec(Codec::Unknown), Err(Error::Unsupported(_))));
    }

    #[test]
    fn verify_sample_format_allow_list() {
        let format = check_sample_format(Some(SampleFormat::S32Planar)).unwrap();
        assert_eq!(format, SampleFormat::S32Planar);
        assert!(check_sample_format(None).is_err());
    }
}
