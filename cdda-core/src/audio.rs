// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides primitives for working with decoded CDDA audio.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::errors::{decode_error, Result};
use crate::sample::SampleSequence;

/// The number of stereo samples in one CDDA frame (1/75th of a second).
pub const SAMPLES_PER_FRAME: u64 = 588;

/// The number of bytes of one stereo sample with 16 bits per channel.
pub const BYTES_PER_SAMPLE: u64 = 4;

/// The sample rate of CDDA.
pub const CDDA_SAMPLE_RATE: u32 = 44100;

/// The number of channels of CDDA.
pub const CDDA_CHANNELS: u32 = 2;

/// The number of bits per sample of CDDA.
pub const CDDA_BITS_PER_SAMPLE: u32 = 16;

/// `AudioSize` is the length of a stream of CDDA audio.
///
/// The length is counted in stereo samples. A stereo sample is one sample for each of the two
/// channels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AudioSize {
    samples: u64,
}

impl AudioSize {
    pub fn from_samples(samples: u64) -> Self {
        AudioSize { samples }
    }

    pub fn from_frames(frames: u64) -> Self {
        AudioSize { samples: frames * SAMPLES_PER_FRAME }
    }

    /// Instantiate an `AudioSize` from a byte count. Trailing bytes of an incomplete sample are
    /// not counted.
    pub fn from_bytes(bytes: u64) -> Self {
        AudioSize { samples: bytes / BYTES_PER_SAMPLE }
    }

    /// The number of stereo samples.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// The number of CDDA frames, rounded up to the next complete frame.
    pub fn frames(&self) -> u64 {
        self.samples.div_ceil(SAMPLES_PER_FRAME)
    }

    /// The number of bytes.
    pub fn bytes(&self) -> u64 {
        self.samples * BYTES_PER_SAMPLE
    }

    pub fn is_zero(&self) -> bool {
        self.samples == 0
    }
}

impl fmt::Display for AudioSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} samples", self.samples)
    }
}

bitflags! {
    /// Channel positions.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Channels: u32 {
        const FRONT_LEFT         = 0x0000_0001;
        const FRONT_RIGHT        = 0x0000_0002;
        const FRONT_CENTRE       = 0x0000_0004;
        const LFE1               = 0x0000_0008;
        const REAR_LEFT          = 0x0000_0010;
        const REAR_RIGHT         = 0x0000_0020;
        const FRONT_LEFT_CENTRE  = 0x0000_0040;
        const FRONT_RIGHT_CENTRE = 0x0000_0080;
        const REAR_CENTRE        = 0x0000_0100;
        const SIDE_LEFT          = 0x0000_0200;
        const SIDE_RIGHT         = 0x0000_0400;
    }
}

/// The channel layout reported by a decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    /// The stream does not declare a layout.
    Unspecified,
    /// A set of channel positions. Channels are stored in ascending order of their position bit.
    Mask(Channels),
    /// An explicit order of channel positions.
    Ordered(SmallVec<[Channels; 2]>),
}

impl ChannelLayout {
    /// Returns `true` if the layout is exactly front-left followed by front-right.
    pub fn is_left_right(&self) -> bool {
        match self {
            ChannelLayout::Unspecified => false,
            ChannelLayout::Mask(mask) => *mask == Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
            ChannelLayout::Ordered(order) => {
                order.as_slice() == [Channels::FRONT_LEFT, Channels::FRONT_RIGHT]
            }
        }
    }

    /// Returns `true` if the physical channel order must be swapped to obtain left/right order.
    ///
    /// An unspecified layout with two channels is taken as left/right, many lossless encoders do
    /// not store a layout at all.
    pub fn is_swapped(&self, n_channels: u32) -> bool {
        match self {
            ChannelLayout::Unspecified => {
                if n_channels != CDDA_CHANNELS {
                    log::debug!("unspecified layout for {} channels", n_channels);
                }
                false
            }
            _ => !self.is_left_right(),
        }
    }
}

/// The layout and width of the samples in a decoded [`Frame`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 16-bit signed, interleaved.
    S16,
    /// 16-bit signed, one plane per channel.
    S16Planar,
    /// 32-bit signed, interleaved.
    S32,
    /// 32-bit signed, one plane per channel.
    S32Planar,
}

impl SampleFormat {
    /// The number of memory planes a stereo frame of this format occupies.
    pub fn planes(&self) -> usize {
        if self.is_planar() {
            2
        }
        else {
            1
        }
    }

    pub fn is_planar(&self) -> bool {
        matches!(self, SampleFormat::S16Planar | SampleFormat::S32Planar)
    }

    /// The number of bytes of one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S16 | SampleFormat::S16Planar => 2,
            SampleFormat::S32 | SampleFormat::S32Planar => 4,
        }
    }
}

/// A `Frame` is one block of decoded stereo audio as produced by a decoder.
///
/// The samples are stored as native-endian bytes, either interleaved in one plane or in one plane
/// per channel. 32-bit samples carry a right shift that maps the stored value onto the 16-bit
/// range, e.g. 16 for samples that are left-justified in 32 bits.
#[derive(Clone, Debug)]
pub struct Frame {
    format: SampleFormat,
    n_samples: usize,
    planes: SmallVec<[Vec<u8>; 2]>,
    shift: u32,
}

impl Frame {
    /// Instantiate a `Frame` of `n_samples` stereo samples from raw planes.
    ///
    /// The number and length of the planes must match the format.
    pub fn new(
        format: SampleFormat,
        n_samples: usize,
        planes: SmallVec<[Vec<u8>; 2]>,
        shift: u32,
    ) -> Result<Frame> {
        if planes.len() != format.planes() {
            return decode_error("frame: plane count does not match sample format");
        }

        let plane_len = n_samples * format.bytes_per_sample() * (3 - format.planes());

        if planes.iter().any(|plane| plane.len() != plane_len) {
            return decode_error("frame: plane length does not match sample count");
        }

        if shift >= 32 {
            return decode_error("frame: shift exceeds sample width");
        }

        Ok(Frame { format, n_samples, planes, shift })
    }

    /// Instantiate a `Frame` from interleaved 16-bit samples.
    pub fn from_interleaved_i16(samples: &[i16]) -> Frame {
        let bytes = bytemuck::cast_slice::<i16, u8>(&samples[..samples.len() & !1]).to_vec();
        let n_samples = samples.len() / 2;
        Frame { format: SampleFormat::S16, n_samples, planes: smallvec::smallvec![bytes], shift: 0 }
    }

    /// Instantiate a `Frame` from one plane of 16-bit samples per channel.
    pub fn from_planar_i16(left: &[i16], right: &[i16]) -> Frame {
        let n_samples = left.len().min(right.len());
        let planes = smallvec::smallvec![
            bytemuck::cast_slice::<i16, u8>(&left[..n_samples]).to_vec(),
            bytemuck::cast_slice::<i16, u8>(&right[..n_samples]).to_vec(),
        ];
        Frame { format: SampleFormat::S16Planar, n_samples, planes, shift: 0 }
    }

    /// Instantiate a `Frame` from interleaved 32-bit samples, shifted left by `shift` bits.
    pub fn from_interleaved_i32(samples: &[i32], shift: u32) -> Frame {
        let bytes = bytemuck::cast_slice::<i32, u8>(&samples[..samples.len() & !1]).to_vec();
        let n_samples = samples.len() / 2;
        Frame { format: SampleFormat::S32, n_samples, planes: smallvec::smallvec![bytes], shift }
    }

    /// Instantiate a `Frame` from one plane of 32-bit samples per channel, shifted left by `shift`
    /// bits.
    pub fn from_planar_i32(left: &[i32], right: &[i32], shift: u32) -> Frame {
        let n_samples = left.len().min(right.len());
        let planes = smallvec::smallvec![
            bytemuck::cast_slice::<i32, u8>(&left[..n_samples]).to_vec(),
            bytemuck::cast_slice::<i32, u8>(&right[..n_samples]).to_vec(),
        ];
        Frame { format: SampleFormat::S32Planar, n_samples, planes, shift }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// The number of stereo samples in the frame.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Gets a canonical view of the samples in the frame. If `swapped` is set, the first channel
    /// is taken to be the right channel.
    pub fn samples(&self, swapped: bool) -> SampleSequence<'_> {
        let planes = &self.planes;

        match self.format {
            SampleFormat::S16 => SampleSequence::interleaved_16(&planes[0], swapped),
            SampleFormat::S16Planar => SampleSequence::planar_16(&planes[0], &planes[1], swapped),
            SampleFormat::S32 => SampleSequence::interleaved_32(&planes[0], self.shift, swapped),
            SampleFormat::S32Planar => {
                SampleSequence::planar_32(&planes[0], &planes[1], self.shift, swapped)
            }
        }
    }
}
