// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cdda_core::errors::{decode_error, unsupported_error, Result};
use symphonia_core::io::ReadBytes;

use log::{debug, info};

/// WAVE is actually a RIFF stream, with a "RIFF" ASCII stream marker.
pub const WAVE_STREAM_MARKER: [u8; 4] = *b"RIFF";
/// A possible RIFF form is "wave".
pub const WAVE_RIFF_FORM: [u8; 4] = *b"WAVE";

const FMT_CHUNK_ID: [u8; 4] = *b"fmt ";
const DATA_CHUNK_ID: [u8; 4] = *b"data";

/// The format tag of integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 0x0001;

/// The canonical header of a CDDA WAVE file, up to and including the data chunk id.
///
/// Each entry is an offset and the bytes expected at that offset. The RIFF length at offset 4 and
/// the data length at offset 40 vary between files and are not part of the canonical header.
const CDDA_HEADER: &[(usize, &[u8])] = &[
    (0, &WAVE_STREAM_MARKER),
    (8, &WAVE_RIFF_FORM),
    (12, &FMT_CHUNK_ID),
    // Length of the format chunk, 16.
    (16, &[0x10, 0x00, 0x00, 0x00]),
    // Format tag, integer PCM.
    (20, &[0x01, 0x00]),
    // Number of channels, 2.
    (22, &[0x02, 0x00]),
    // Sample rate, 44100.
    (24, &[0x44, 0xac, 0x00, 0x00]),
    // Average bytes per second, 176400.
    (28, &[0x10, 0xb1, 0x02, 0x00]),
    // Block align, 4.
    (32, &[0x04, 0x00]),
    // Bits per sample, 16.
    (34, &[0x10, 0x00]),
    (36, &DATA_CHUNK_ID),
];

/// The length of the canonical header of a CDDA WAVE file.
pub const CDDA_HEADER_LEN: usize = 44;

/// Returns `true` if `bytes` starts with a canonical CDDA WAVE header.
pub fn is_cdda_header(bytes: &[u8]) -> bool {
    if bytes.len() < CDDA_HEADER_LEN {
        return false;
    }

    CDDA_HEADER
        .iter()
        .all(|(offset, expected)| &bytes[*offset..*offset + expected.len()] == *expected)
}

/// The WAVE format chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveFormatChunk {
    pub format_tag: u16,
    pub n_channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WaveFormatChunk {
    fn read<B: ReadBytes>(reader: &mut B, len: u32) -> Result<Self> {
        // The basic WaveFormat struct is 16 bytes. Extended variants append extra data that is
        // irrelevant for integer PCM.
        if len < 16 {
            return decode_error("wav: malformed fmt chunk");
        }

        let format = WaveFormatChunk {
            format_tag: reader.read_u16()?,
            n_channels: reader.read_u16()?,
            sample_rate: reader.read_u32()?,
            avg_bytes_per_sec: reader.read_u32()?,
            block_align: reader.read_u16()?,
            bits_per_sample: reader.read_u16()?,
        };

        reader.ignore_bytes(u64::from(len - 16))?;

        Ok(format)
    }
}

/// The header of a WAVE file: its format, and the location of its audio data.
#[derive(Clone, Debug)]
pub struct WaveHeader {
    pub format: WaveFormatChunk,
    /// The length of the data chunk in bytes.
    pub data_len: u32,
}

/// Reads the RIFF chunks of a WAVE file up to the start of the audio data.
///
/// On success, `reader` is positioned at the first byte of audio data.
pub fn read_header<B: ReadBytes>(reader: &mut B) -> Result<WaveHeader> {
    // The top-level chunk has the RIFF chunk ID. This is also the file marker.
    if reader.read_quad_bytes()? != WAVE_STREAM_MARKER {
        return unsupported_error("wav: missing riff stream marker");
    }

    let riff_len = reader.read_u32()?;

    if riff_len < 4 {
        return decode_error("wav: invalid riff length");
    }

    // The form type. Only the WAVE form is supported.
    if reader.read_quad_bytes()? != WAVE_RIFF_FORM {
        return unsupported_error("wav: riff form is not wave");
    }

    let mut format = None;

    loop {
        let tag = reader.read_quad_bytes()?;
        let len = reader.read_u32()?;

        match tag {
            FMT_CHUNK_ID => {
                format = Some(WaveFormatChunk::read(reader, len)?);
            }
            DATA_CHUNK_ID => {
                let Some(format) = format
                else {
                    return decode_error("wav: missing fmt chunk");
                };

                debug!("data chunk of {} bytes at {}", len, reader.pos());

                return Ok(WaveHeader { format, data_len: len });
            }
            _ => {
                // Unknown chunks are ignored.
                let name = String::from_utf8_lossy(&tag);
                info!("ignoring unknown chunk: tag={}, len={}.", name, len);

                // Chunks are aligned to a 2-byte boundary.
                reader.ignore_bytes(u64::from(len) + u64::from(len & 1))?;
            }
        }
    }
}
