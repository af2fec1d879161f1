// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::path::PathBuf;

use cdda::core::audio::AudioSize;
use cdda::core::sample::{SampleSequence, StereoSample};
use cdda::core::sink::SampleSink;

/// A file in the temporary directory that is removed when dropped.
pub struct TempFile(pub PathBuf);

impl TempFile {
    pub fn new(name: &str, bytes: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("cdda-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        TempFile(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Builds a 16-bit PCM WAVE file. A non-empty `junk` chunk is placed between the format and data
/// chunks.
pub fn wave(channels: u16, rate: u32, pcm: &[i16], junk: &[u8]) -> Vec<u8> {
    let block_align = channels * 2;

    let mut buf = Vec::new();
    buf.extend_from_slice(b"RIFF\0\0\0\0WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&rate.to_le_bytes());
    buf.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&16u16.to_le_bytes());

    if !junk.is_empty() {
        buf.extend_from_slice(b"JUNK");
        buf.extend_from_slice(&(junk.len() as u32).to_le_bytes());
        buf.extend_from_slice(junk);
        if junk.len() % 2 == 1 {
            buf.push(0);
        }
    }

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&((pcm.len() * 2) as u32).to_le_bytes());
    for sample in pcm {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    let riff_len = (buf.len() - 8) as u32;
    buf[4..8].copy_from_slice(&riff_len.to_le_bytes());
    buf
}

/// Interleaved stereo PCM with distinct values in each channel.
pub fn stereo_pcm(n: usize) -> Vec<i16> {
    (0..n).flat_map(|i| [(i % 30_000) as i16, -((i % 20_000) as i16) - 1]).collect()
}

#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    Start,
    Size(u64),
    Samples(usize),
    End,
}

/// Records the calls of a reader and the samples it delivers.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub samples: Vec<StereoSample>,
}

impl Recorder {
    pub fn sizes(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Size(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

impl SampleSink for Recorder {
    fn start_input(&mut self) {
        self.events.push(Event::Start);
    }

    fn append_samples(&mut self, samples: SampleSequence<'_>) {
        self.events.push(Event::Samples(samples.len()));
        self.samples.extend(samples.iter());
    }

    fn update_audiosize(&mut self, size: AudioSize) {
        self.events.push(Event::Size(size.samples()));
    }

    fn end_input(&mut self) {
        self.events.push(Event::End);
    }
}

/// CRC-8 of a FLAC frame header, polynomial 0x07.
fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

/// CRC-16 of a FLAC frame, polynomial 0x8005.
fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }
    crc
}

/// Builds a 16-bit stereo 44100 Hz FLAC stream of verbatim subframes with `block` samples per
/// frame. At most 128 frames.
pub fn flac(pcm: &[i16], block: usize) -> Vec<u8> {
    let n_samples = (pcm.len() / 2) as u64;

    let mut buf = b"fLaC".to_vec();

    // The last metadata block, a 34 byte STREAMINFO.
    buf.extend_from_slice(&[0x80, 0x00, 0x00, 34]);
    buf.extend_from_slice(&(block as u16).to_be_bytes());
    buf.extend_from_slice(&(block as u16).to_be_bytes());
    // Minimum and maximum frame sizes are unknown.
    buf.extend_from_slice(&[0; 6]);
    // Sample rate, channels - 1, bits per sample - 1, and total samples.
    let packed = (44100u64 << 44) | (1 << 41) | (15 << 36) | n_samples;
    buf.extend_from_slice(&packed.to_be_bytes());
    // No MD5 signature.
    buf.extend_from_slice(&[0; 16]);

    for (number, chunk) in pcm.chunks(block * 2).enumerate() {
        let len = chunk.len() / 2;
        let start = buf.len();

        // Fixed block size stored after the frame number, 44.1 kHz, independent left and right
        // channels, 16 bits per sample.
        buf.extend_from_slice(&[0xff, 0xf8, 0x79, 0x18]);
        buf.push(number as u8);
        buf.extend_from_slice(&((len - 1) as u16).to_be_bytes());

        let crc = crc8(&buf[start..]);
        buf.push(crc);

        for channel in 0..2 {
            // Verbatim subframe, no wasted bits.
            buf.push(0x02);
            for sample in chunk.chunks_exact(2) {
                buf.extend_from_slice(&sample[channel].to_be_bytes());
            }
        }

        let crc = crc16(&buf[start..]);
        buf.extend_from_slice(&crc.to_be_bytes());
    }

    buf
}
