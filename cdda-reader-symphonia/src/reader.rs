// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::path::Path;

use cdda_core::audio::{AudioSize, ChannelLayout, Channels, Frame, SampleFormat};
use cdda_core::errors::{decode_error, is_end_of_stream, unsupported_error, Error, Result};
use cdda_core::formats::Codec;
use cdda_core::profile::{check_codec, check_sample_format, validate_cdda, StreamProperties};
use cdda_core::queue::{BufferedDecoder, Demuxer, PacketDecoder};
use cdda_core::reader::{AudioReader, ReaderOptions};
use cdda_core::session::{declared_samples, DecodeSession, StreamInfo};
use cdda_core::sink::SampleSink;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{self, CodecParameters, CodecType, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat as SymphoniaSampleFormat;
use symphonia::default::codecs::FlacDecoder;
use symphonia::default::formats::FlacReader;

use log::{debug, info, warn};

/// Converts a Symphonia error into a cdda error.
pub fn map_error(err: SymphoniaError) -> Error {
    match err {
        SymphoniaError::IoError(err) => Error::IoError(err),
        SymphoniaError::DecodeError(desc) => Error::DecodeError(desc),
        SymphoniaError::Unsupported(feature) => Error::Unsupported(feature),
        SymphoniaError::LimitError(desc) => Error::DecodeError(desc),
        SymphoniaError::SeekError(_) => Error::DecodeError("symphonia: seek error"),
        SymphoniaError::ResetRequired => Error::DecodeError("symphonia: stream parameters changed"),
    }
}

/// Maps a Symphonia codec type to a cdda codec.
pub fn map_codec(codec: CodecType) -> Codec {
    match codec {
        codecs::CODEC_TYPE_PCM_S16LE => Codec::PcmS16Le,
        codecs::CODEC_TYPE_PCM_S16LE_PLANAR => Codec::PcmS16LePlanar,
        codecs::CODEC_TYPE_PCM_S16BE => Codec::PcmS16Be,
        codecs::CODEC_TYPE_PCM_S16BE_PLANAR => Codec::PcmS16BePlanar,
        codecs::CODEC_TYPE_PCM_S32LE => Codec::PcmS32Le,
        codecs::CODEC_TYPE_PCM_S32LE_PLANAR => Codec::PcmS32LePlanar,
        codecs::CODEC_TYPE_PCM_S32BE => Codec::PcmS32Be,
        codecs::CODEC_TYPE_PCM_S32BE_PLANAR => Codec::PcmS32BePlanar,
        codecs::CODEC_TYPE_FLAC => Codec::Flac,
        codecs::CODEC_TYPE_ALAC => Codec::Alac,
        codecs::CODEC_TYPE_WAVPACK => Codec::Wavpack,
        codecs::CODEC_TYPE_MONKEYS_AUDIO => Codec::Monkey,
        _ => Codec::Unknown,
    }
}

/// Maps the sample format a Symphonia decoder produces. Lossless decoders that do not declare
/// their format produce 32-bit samples.
fn map_sample_format(format: Option<SymphoniaSampleFormat>) -> Option<SampleFormat> {
    match format {
        Some(SymphoniaSampleFormat::S16) => Some(SampleFormat::S16Planar),
        Some(SymphoniaSampleFormat::S32) | None => Some(SampleFormat::S32Planar),
        Some(_) => None,
    }
}

fn channel_layout(params: &CodecParameters) -> ChannelLayout {
    match params.channels {
        Some(channels) => ChannelLayout::Mask(Channels::from_bits_truncate(channels.bits())),
        None => ChannelLayout::Unspecified,
    }
}

/// `SymphoniaDemuxer` adapts a Symphonia `FormatReader` to the [`Demuxer`] protocol.
pub struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
}

impl Demuxer for SymphoniaDemuxer {
    type Packet = Packet;

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.format.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(ref err)) if is_end_of_stream(err) => Ok(None),
            Err(err) => Err(map_error(err)),
        }
    }

    fn stream_of(&self, packet: &Packet) -> u32 {
        packet.track_id()
    }
}

/// `SymphoniaDecoder` adapts a Symphonia `Decoder` to the [`PacketDecoder`] protocol.
pub struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    /// The shift that right-aligns the significant bits of 32-bit samples.
    shift: u32,
}

impl SymphoniaDecoder {
    /// Finalizes the decoder and checks the result of the verification, if the stream supports
    /// one.
    pub fn finalize(&mut self) -> Result<()> {
        match self.decoder.finalize().verify_ok {
            Some(true) => {
                info!("verification passed");
                Ok(())
            }
            Some(false) => decode_error("symphonia: verification failed"),
            None => Ok(()),
        }
    }
}

impl PacketDecoder<Packet> for SymphoniaDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<Frame>> {
        let decoded = self.decoder.decode(packet).map_err(map_error)?;

        if decoded.frames() == 0 {
            return Ok(None);
        }

        if decoded.spec().channels.count() != 2 {
            return decode_error("symphonia: decoded buffer is not stereo");
        }

        let frame = match decoded {
            AudioBufferRef::S16(buf) => Frame::from_planar_i16(buf.chan(0), buf.chan(1)),
            AudioBufferRef::S32(buf) => {
                Frame::from_planar_i32(buf.chan(0), buf.chan(1), self.shift)
            }
            _ => return unsupported_error("symphonia: decoded sample format is not supported"),
        };

        Ok(Some(frame))
    }
}

/// A file opened and validated for decoding.
struct OpenedStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    info: StreamInfo,
    shift: u32,
}

/// Selects the audio stream among the tracks of a container.
///
/// The first track with a known codec is the audio stream. A container without tracks has no
/// audio stream, a container whose tracks all lack a known codec has no decoder.
pub fn select_track(tracks: &[Track]) -> Result<&Track> {
    if tracks.is_empty() {
        return Err(Error::NoAudioStream);
    }

    match tracks.iter().find(|t| t.codec_params.codec != codecs::CODEC_TYPE_NULL) {
        Some(track) => Ok(track),
        None => {
            warn!("none of {} tracks has a known codec", tracks.len());
            Err(Error::NoDecoder)
        }
    }
}

/// Validates the parameters reported by a decoder and derives the properties of the stream.
///
/// Returns the stream properties and the shift that right-aligns 32-bit samples.
fn validate_stream(params: &CodecParameters, stream_index: u32) -> Result<(StreamInfo, u32)> {
    let sample_format = check_sample_format(map_sample_format(params.sample_format))?;

    let bits_per_sample = params.bits_per_sample.or(params.bits_per_coded_sample).unwrap_or(0);
    let channels = params.channels.map(|c| c.count() as u32).unwrap_or(0);
    let sample_rate = params.sample_rate.unwrap_or(0);

    validate_cdda(&StreamProperties { bits_per_sample, channels, sample_rate })?;

    let declared = match (params.n_frames, params.time_base) {
        (Some(n_frames), Some(tb)) => declared_samples(n_frames, tb.numer, tb.denom, sample_rate),
        (Some(n_frames), None) => n_frames,
        (None, _) => {
            info!("stream does not declare its length");
            0
        }
    };

    let info = StreamInfo {
        stream_index,
        sample_format,
        channels_swapped: channel_layout(params).is_swapped(channels),
        declared_size: AudioSize::from_samples(declared),
    };

    Ok((info, 32 - bits_per_sample))
}

/// The way a [`SymphoniaReader`] instantiates the demuxer and decoder of a file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Detect the container and create the decoder from the codec registry.
    Generic,
    /// Use the FLAC demuxer and decoder directly.
    Flac,
}

/// `SymphoniaReader` reads CDDA audio with the demuxers and decoders of Symphonia, restricted to
/// a set of lossless codecs.
pub struct SymphoniaReader {
    options: ReaderOptions,
    codecs: &'static [Codec],
    backend: Backend,
}

impl SymphoniaReader {
    /// Instantiates a reader that opens any container the Symphonia build supports, and accepts
    /// streams encoded with one of `codecs`.
    pub fn new(options: ReaderOptions, codecs: &'static [Codec]) -> Self {
        SymphoniaReader { options, codecs, backend: Backend::Generic }
    }

    /// Instantiates a reader for native FLAC streams.
    pub fn flac(options: ReaderOptions) -> Self {
        SymphoniaReader { options, codecs: &[Codec::Flac], backend: Backend::Flac }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    fn open_format(&self, path: &Path) -> Result<Box<dyn FormatReader>> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let format_opts = FormatOptions { enable_gapless: true, ..Default::default() };

        match self.backend {
            Backend::Flac => {
                let reader = FlacReader::try_new(mss, &format_opts).map_err(map_error)?;
                Ok(Box::new(reader))
            }
            Backend::Generic => {
                let mut hint = Hint::new();

                if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
                    hint.with_extension(ext);
                }

                let detected = symphonia::default::get_probe()
                    .format(&hint, mss, &format_opts, &MetadataOptions::default())
                    .map_err(map_error)?;

                Ok(detected.format)
            }
        }
    }

    fn make_decoder(&self, params: &CodecParameters) -> Result<Box<dyn Decoder>> {
        let dec_opts = DecoderOptions { verify: self.options.verify };

        let decoder = match self.backend {
            Backend::Flac => FlacDecoder::try_new(params, &dec_opts)
                .map(|decoder| Box::new(decoder) as Box<dyn Decoder>),
            Backend::Generic => symphonia::default::get_codecs().make(params, &dec_opts),
        };

        decoder.map_err(|err| {
            warn!("no decoder for {}: {}", map_codec(params.codec), err);
            Error::NoDecoder
        })
    }

    fn open(&self, path: &Path) -> Result<OpenedStream> {
        let format = self.open_format(path)?;

        let track = select_track(format.tracks())?;
        let params = track.codec_params.clone();
        let stream_index = track.id;

        let codec = map_codec(params.codec);

        debug!("track {}: codec {}", stream_index, codec);

        if !self.codecs.contains(&codec) {
            warn!("codec {} is not accepted by this reader", codec);
            return unsupported_error("symphonia: codec is not accepted");
        }

        check_codec(codec)?;

        let decoder = self.make_decoder(&params)?;

        // Validate the stream as the decoder reports it.
        let (info, shift) = validate_stream(decoder.codec_params(), stream_index)?;

        Ok(OpenedStream { format, decoder, info, shift })
    }
}

impl AudioReader for SymphoniaReader {
    fn acquire_size(&mut self, path: &Path) -> Result<AudioSize> {
        Ok(self.open(path)?.info.declared_size)
    }

    fn process_file(&mut self, path: &Path, sink: &mut dyn SampleSink) -> Result<AudioSize> {
        let opened = self.open(path)?;

        let demuxer = SymphoniaDemuxer { format: opened.format };
        let decoder = SymphoniaDecoder { decoder: opened.decoder, shift: opened.shift };

        let mut session = DecodeSession::new(
            demuxer,
            BufferedDecoder::new(decoder),
            opened.info,
            self.options.session,
        );

        let size = session.process(sink)?;

        let (_, mut decoder) = session.into_inner();
        decoder.inner_mut().finalize()?;

        Ok(size)
    }
}
