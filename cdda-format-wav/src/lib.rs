// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A native reader for RIFF/WAVE files holding CDDA audio, i.e. 16-bit little-endian stereo PCM
//! at 44100 Hz.
//!
//! The reader accepts only files starting with the canonical 44-byte CDDA header. WAVE files with
//! additional chunks are left to more general backends.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::fs::File;
use std::path::Path;

use cdda_core::audio::{AudioSize, ChannelLayout, Frame, SampleFormat, BYTES_PER_SAMPLE};
use cdda_core::descriptor::{ci_match_suffix, Descriptor, InputType};
use cdda_core::errors::{decode_error, is_end_of_stream, unsupported_error, Result};
use cdda_core::formats::{Codec, Format};
use cdda_core::profile::{check_codec, validate_cdda, StreamProperties};
use cdda_core::queue::{BufferedDecoder, Demuxer, PacketDecoder};
use cdda_core::reader::{AudioReader, FileReader, ReaderOptions};
use cdda_core::session::{DecodeSession, StreamInfo};
use cdda_core::sink::SampleSink;
use symphonia_core::io::{MediaSourceStream, ReadBytes};

use log::{debug, warn};

mod chunks;

pub use chunks::{is_cdda_header, CDDA_HEADER_LEN};
use chunks::{read_header, WaveHeader, WAVE_FORMAT_PCM};

/// The length of one stereo sample in bytes.
const SAMPLE_LEN: usize = BYTES_PER_SAMPLE as usize;

/// Describes the native WAVE reader.
#[derive(Copy, Clone, Debug, Default)]
pub struct WavDescriptor;

impl Descriptor for WavDescriptor {
    fn id(&self) -> &'static str {
        "wav"
    }

    fn name(&self) -> &'static str {
        "RIFF/WAVE (PCM)"
    }

    fn formats(&self) -> &'static [Format] {
        &[Format::Wav]
    }

    fn codecs(&self) -> &'static [Codec] {
        &[Codec::PcmS16Le]
    }

    fn input_type(&self) -> InputType {
        InputType::Audio
    }

    fn accepts_bytes(&self, bytes: &[u8], offset: u64) -> bool {
        offset == 0 && is_cdda_header(bytes)
    }

    fn accepts_name(&self, filename: &str) -> bool {
        ci_match_suffix(&["wav", "wave"], filename)
    }

    fn create_reader(&self) -> FileReader {
        FileReader::Audio(Box::new(WavReader::new(Default::default())))
    }
}

/// An opened WAVE file positioned at its first sample.
struct OpenedWav {
    reader: MediaSourceStream,
    header: WaveHeader,
}

impl OpenedWav {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = MediaSourceStream::new(Box::new(file), Default::default());

        let header = read_header(&mut reader)?;
        let format = &header.format;

        if format.format_tag != WAVE_FORMAT_PCM {
            warn!("wav: format tag {:#06x} is not integer pcm", format.format_tag);
            return unsupported_error("wav: format is not integer pcm");
        }

        let codec = match format.bits_per_sample {
            16 => Codec::PcmS16Le,
            32 => Codec::PcmS32Le,
            _ => Codec::Unknown,
        };

        validate_cdda(&StreamProperties {
            bits_per_sample: u32::from(format.bits_per_sample),
            channels: u32::from(format.n_channels),
            sample_rate: format.sample_rate,
        })?;

        check_codec(codec)?;

        if usize::from(format.block_align) != SAMPLE_LEN
            || format.avg_bytes_per_sec != format.sample_rate * u32::from(format.block_align)
        {
            return decode_error("wav: inconsistent block alignment");
        }

        if u64::from(header.data_len) % BYTES_PER_SAMPLE != 0 {
            warn!("wav: data chunk ends with a partial sample, it will be ignored");
        }

        Ok(OpenedWav { reader, header })
    }

    fn declared_size(&self) -> AudioSize {
        AudioSize::from_bytes(u64::from(self.header.data_len))
    }

    /// The plain PCM format chunk carries no channel mask.
    fn channel_layout(&self) -> ChannelLayout {
        ChannelLayout::Unspecified
    }

    fn stream_info(&self) -> StreamInfo {
        let n_channels = u32::from(self.header.format.n_channels);

        StreamInfo {
            stream_index: 0,
            sample_format: SampleFormat::S16,
            channels_swapped: self.channel_layout().is_swapped(n_channels),
            declared_size: self.declared_size(),
        }
    }
}

/// `WavDemuxer` splits the data chunk into packets of a fixed number of samples.
pub struct WavDemuxer<B: ReadBytes> {
    reader: B,
    remaining: u64,
    packet_len: usize,
}

impl<B: ReadBytes> WavDemuxer<B> {
    /// Instantiates a demuxer for `data_len` bytes of audio data starting at the current position
    /// of `reader`.
    pub fn new(reader: B, data_len: u64, samples_per_packet: usize) -> Self {
        let aligned = data_len - data_len % BYTES_PER_SAMPLE;
        let packet_len = samples_per_packet.max(1) * SAMPLE_LEN;

        WavDemuxer { reader, remaining: aligned, packet_len }
    }
}

impl<B: ReadBytes> Demuxer for WavDemuxer<B> {
    type Packet = Box<[u8]>;

    fn next_packet(&mut self) -> Result<Option<Box<[u8]>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let len = self.remaining.min(self.packet_len as u64) as usize;
        let mut buf = vec![0u8; len];
        let mut read = 0;

        while read < len {
            match self.reader.read_buf(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(ref err) if is_end_of_stream(err) => break,
                Err(err) => return Err(err.into()),
            }
        }

        if read < len {
            warn!(
                "wav: file is truncated, {} bytes of audio data are missing",
                self.remaining - read as u64
            );
            self.remaining = 0;
            buf.truncate(read - read % SAMPLE_LEN);
        }
        else {
            self.remaining -= len as u64;
        }

        if buf.is_empty() {
            return Ok(None);
        }

        Ok(Some(buf.into_boxed_slice()))
    }

    fn stream_of(&self, _: &Box<[u8]>) -> u32 {
        0
    }
}

/// `PcmDecoder` converts 16-bit little-endian interleaved PCM.
#[derive(Default)]
pub struct PcmDecoder {
    buf: Vec<i16>,
}

impl PacketDecoder<Box<[u8]>> for PcmDecoder {
    fn decode(&mut self, packet: &Box<[u8]>) -> Result<Option<Frame>> {
        self.buf.clear();
        self.buf.extend(packet.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])));

        Ok(Some(Frame::from_interleaved_i16(&self.buf)))
    }
}

/// `WavReader` reads CDDA audio from WAVE files.
pub struct WavReader {
    options: ReaderOptions,
}

impl WavReader {
    pub fn new(options: ReaderOptions) -> Self {
        WavReader { options }
    }
}

impl AudioReader for WavReader {
    fn acquire_size(&mut self, path: &Path) -> Result<AudioSize> {
        Ok(OpenedWav::open(path)?.declared_size())
    }

    fn process_file(&mut self, path: &Path, sink: &mut dyn SampleSink) -> Result<AudioSize> {
        let wav = OpenedWav::open(path)?;
        let info = wav.stream_info();

        debug!("wav: {} declares {}", path.display(), info.declared_size);

        let demuxer = WavDemuxer::new(
            wav.reader,
            u64::from(wav.header.data_len),
            self.options.samples_per_read,
        );

        let mut session = DecodeSession::new(
            demuxer,
            BufferedDecoder::new(PcmDecoder::default()),
            info,
            self.options.session,
        );

        session.process(sink)
    }
}
