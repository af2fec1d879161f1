// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sample` module normalizes decoded frames into canonical stereo samples.
//!
//! Decoders produce frames in one of four physical layouts: 16 or 32 bits per sample, either
//! interleaved or with one memory plane per channel. A [`SampleSequence`] is a borrowed view over
//! such a frame that yields the samples as [`StereoSample`]s in left/right order, independent of
//! the physical layout. No sample data is copied.

use std::iter::FusedIterator;

/// One sample of each of the left and right channels, normalized to the 16-bit range.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StereoSample {
    pub left: i32,
    pub right: i32,
}

impl StereoSample {
    pub fn new(left: i32, right: i32) -> Self {
        StereoSample { left, right }
    }

    /// Packs the sample into a 32-bit unit with the right channel in the upper and the left
    /// channel in the lower 16 bits.
    pub fn to_u32(&self) -> u32 {
        ((self.right as u32) << 16) | (self.left as u32 & 0xffff)
    }

    /// Unpacks a sample previously packed with [`StereoSample::to_u32`].
    pub fn from_u32(packed: u32) -> Self {
        let left = i32::from(packed as u16 as i16);
        let right = i32::from((packed >> 16) as i16);

        StereoSample { left, right }
    }
}

#[derive(Copy, Clone, Debug)]
enum Layout<'a> {
    Interleaved16(&'a [u8]),
    Planar16(&'a [u8], &'a [u8]),
    Interleaved32(&'a [u8], u32),
    Planar32(&'a [u8], &'a [u8], u32),
}

#[inline(always)]
fn read_16(bytes: &[u8], idx: usize) -> i32 {
    i32::from(bytemuck::pod_read_unaligned::<i16>(&bytes[2 * idx..2 * idx + 2]))
}

#[inline(always)]
fn read_32(bytes: &[u8], idx: usize, shift: u32) -> i32 {
    bytemuck::pod_read_unaligned::<i32>(&bytes[4 * idx..4 * idx + 4]) >> shift
}

/// A canonical, read-only view of the stereo samples of one decoded frame.
#[derive(Copy, Clone, Debug)]
pub struct SampleSequence<'a> {
    layout: Layout<'a>,
    len: usize,
    swapped: bool,
}

impl<'a> SampleSequence<'a> {
    /// View over interleaved native-endian 16-bit samples.
    pub fn interleaved_16(bytes: &'a [u8], swapped: bool) -> Self {
        SampleSequence { layout: Layout::Interleaved16(bytes), len: bytes.len() / 4, swapped }
    }

    /// View over two planes of native-endian 16-bit samples.
    pub fn planar_16(first: &'a [u8], second: &'a [u8], swapped: bool) -> Self {
        let len = first.len().min(second.len()) / 2;
        SampleSequence { layout: Layout::Planar16(first, second), len, swapped }
    }

    /// View over interleaved native-endian 32-bit samples. Each sample is arithmetically shifted
    /// right by `shift` bits.
    pub fn interleaved_32(bytes: &'a [u8], shift: u32, swapped: bool) -> Self {
        let len = bytes.len() / 8;

        SampleSequence { layout: Layout::Interleaved32(bytes, shift), len, swapped }
    }

    /// View over two planes of native-endian 32-bit samples. Each sample is arithmetically shifted
    /// right by `shift` bits.
    pub fn planar_32(first: &'a [u8], second: &'a [u8], shift: u32, swapped: bool) -> Self {
        let len = first.len().min(second.len()) / 4;
        SampleSequence { layout: Layout::Planar32(first, second, shift), len, swapped }
    }

    /// The number of stereo samples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the physical channel order is right/left.
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Gets the stereo sample at index `idx`, or `None` if out of bounds.
    pub fn get(&self, idx: usize) -> Option<StereoSample> {
        if idx >= self.len {
            return None;
        }

        let (first, second) = match self.layout {
            Layout::Interleaved16(buf) => (read_16(buf, 2 * idx), read_16(buf, 2 * idx + 1)),
            Layout::Planar16(a, b) => (read_16(a, idx), read_16(b, idx)),
            Layout::Interleaved32(buf, shift) => {
                (read_32(buf, 2 * idx, shift), read_32(buf, 2 * idx + 1, shift))
            }
            Layout::Planar32(a, b, shift) => (read_32(a, idx, shift), read_32(b, idx, shift)),
        };

        if self.swapped {
            Some(StereoSample::new(second, first))
        }
        else {
            Some(StereoSample::new(first, second))
        }
    }

    /// Gets an iterator over the stereo samples.
    pub fn iter(&self) -> Samples<'a> {
        Samples { seq: *self, pos: 0 }
    }
}

impl<'a> IntoIterator for SampleSequence<'a> {
    type Item = StereoSample;
    type IntoIter = Samples<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Samples { seq: self, pos: 0 }
    }
}

/// An iterator over the stereo samples of a [`SampleSequence`].
pub struct Samples<'a> {
    seq: SampleSequence<'a>,
    pos: usize,
}

impl Iterator for Samples<'_> {
    type Item = StereoSample;

    fn next(&mut self) -> Option<StereoSample> {
        let sample = self.seq.get(self.pos)?;
        self.pos += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.seq.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples<'_> {}

impl FusedIterator for Samples<'_> {}
