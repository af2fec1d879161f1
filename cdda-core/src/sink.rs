// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sink` module defines the protocol by which decoded samples are delivered to a consumer.

use log::debug;

use crate::audio::AudioSize;
use crate::sample::SampleSequence;

/// A `SampleSink` consumes the samples of one input file.
///
/// A reader calls the methods in the following order:
///
/// 1. `start_input` exactly once, before anything else.
/// 2. `update_audiosize` with the declared size, before any samples.
/// 3. `append_samples` zero or more times.
/// 4. `update_audiosize` with the authoritative size, strictly before the last `append_samples`.
/// 5. `end_input` exactly once.
///
/// Knowing the final size before the last block of samples arrives allows a consumer to
/// recognize the last block as such.
pub trait SampleSink {
    fn start_input(&mut self);

    fn append_samples(&mut self, samples: SampleSequence<'_>);

    fn update_audiosize(&mut self, size: AudioSize);

    fn end_input(&mut self);
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn start_input(&mut self) {
        (**self).start_input()
    }

    fn append_samples(&mut self, samples: SampleSequence<'_>) {
        (**self).append_samples(samples)
    }

    fn update_audiosize(&mut self, size: AudioSize) {
        (**self).update_audiosize(size)
    }

    fn end_input(&mut self) {
        (**self).end_input()
    }
}

/// `BlockAccumulator` regroups the samples it receives into blocks of a fixed size before passing
/// them on to an inner sink.
///
/// Every block but the last contains exactly `block_size` samples. Size updates are passed on
/// immediately, the last incomplete block is passed on when the input ends. Therefore, the
/// ordering guarantees of the [`SampleSink`] protocol hold for the inner sink as well.
pub struct BlockAccumulator<S: SampleSink> {
    inner: S,
    block_size: usize,
    block: Vec<i16>,
    blocks: u64,
}

impl<S: SampleSink> BlockAccumulator<S> {
    /// Instantiate a `BlockAccumulator` passing blocks of `block_size` stereo samples to `inner`.
    pub fn new(inner: S, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        BlockAccumulator { inner, block_size, block: Vec::with_capacity(2 * block_size), blocks: 0 }
    }

    /// The number of blocks passed on so far.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn flush(&mut self) {
        if self.block.is_empty() {
            return;
        }

        let bytes = bytemuck::cast_slice::<i16, u8>(&self.block);
        self.inner.append_samples(SampleSequence::interleaved_16(bytes, false));
        self.blocks += 1;
        self.block.clear();
    }
}

impl<S: SampleSink> SampleSink for BlockAccumulator<S> {
    fn start_input(&mut self) {
        self.block.clear();
        self.blocks = 0;
        self.inner.start_input();
    }

    fn append_samples(&mut self, samples: SampleSequence<'_>) {
        for sample in samples {
            // Samples are normalized to 16 bits, so the truncation is lossless.
            self.block.push(sample.left as i16);
            self.block.push(sample.right as i16);

            if self.block.len() == 2 * self.block_size {
                self.flush();
            }
        }
    }

    fn update_audiosize(&mut self, size: AudioSize) {
        self.inner.update_audiosize(size);
    }

    fn end_input(&mut self) {
        self.flush();
        debug!("passed on {} blocks", self.blocks);
        self.inner.end_input();
    }
}
