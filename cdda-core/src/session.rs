// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `session` module decodes an opened audio stream into a [`SampleSink`].

use std::cmp::Ordering;

use log::{debug, info, warn};

use crate::audio::{AudioSize, Frame, SampleFormat};
use crate::errors::{decode_error, Result};
use crate::queue::{
    Demuxer, Dequeued, FrameDecoder, FrameQueue, SendStatus, DEFAULT_QUEUE_CAPACITY,
};
use crate::sink::SampleSink;

/// The default maximum number of end-of-stream passes while flushing a decoder.
pub const DEFAULT_MAX_FLUSH_PASSES: usize = 8;

/// The number of times in a row a decoder may refuse a packet without emitting a frame.
const MAX_CONSECUTIVE_REFUSALS: usize = 16;

/// `SessionOptions` is a common set of options that all decode sessions use.
#[derive(Copy, Clone, Debug)]
pub struct SessionOptions {
    /// The capacity of the packet queue between demuxer and decoder.
    pub queue_capacity: usize,
    /// The maximum number of times the end of the stream is signalled to a decoder that holds back
    /// frames.
    pub max_flush_passes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_flush_passes: DEFAULT_MAX_FLUSH_PASSES,
        }
    }
}

/// The properties of an opened and validated stream that the session needs to decode it.
#[derive(Copy, Clone, Debug)]
pub struct StreamInfo {
    /// The index of the stream to decode. Packets of all other streams are discarded.
    pub stream_index: u32,
    /// The sample format the decoder produces.
    pub sample_format: SampleFormat,
    /// `true` if the decoder produces the right channel first.
    pub channels_swapped: bool,
    /// The size of the stream as declared by the container.
    pub declared_size: AudioSize,
}

/// Estimates the number of samples of a stream of `duration` time base units.
///
/// The time base is given as `numer / denom` seconds per unit.
pub fn declared_samples(duration: u64, numer: u32, denom: u32, sample_rate: u32) -> u64 {
    if denom == 0 {
        return 0;
    }

    let samples =
        u128::from(duration) * u128::from(numer) * u128::from(sample_rate) / u128::from(denom);

    u64::try_from(samples).unwrap_or(u64::MAX)
}

/// A `DecodeSession` decodes one stream of one opened file.
///
/// The session owns the demuxer and decoder. It must not be shared, and the sink it drives must
/// not call back into it.
pub struct DecodeSession<D, C> {
    demuxer: D,
    decoder: C,
    info: StreamInfo,
    options: SessionOptions,
}

impl<D, C> DecodeSession<D, C>
where
    D: Demuxer,
    C: FrameDecoder<D::Packet>,
{
    pub fn new(demuxer: D, decoder: C, info: StreamInfo, options: SessionOptions) -> Self {
        debug!(
            "session for stream {}: {:?}, {} planes, swapped={}, declared {}",
            info.stream_index,
            info.sample_format,
            info.sample_format.planes(),
            info.channels_swapped,
            info.declared_size,
        );

        DecodeSession { demuxer, decoder, info, options }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// The size declared by the container, an estimate available before decoding.
    pub fn declared_size(&self) -> AudioSize {
        self.info.declared_size
    }

    pub fn channels_swapped(&self) -> bool {
        self.info.channels_swapped
    }

    /// The number of memory planes of a decoded frame, 1 if interleaved, 2 if planar.
    pub fn planes(&self) -> usize {
        self.info.sample_format.planes()
    }

    /// Consumes the session and returns the demuxer and decoder.
    pub fn into_inner(self) -> (D, C) {
        (self.demuxer, self.decoder)
    }

    /// Decodes the whole stream and passes the samples to `sink`.
    ///
    /// The authoritative size, i.e. the number of samples actually decoded, is passed to
    /// `sink.update_audiosize` before the last call to `sink.append_samples`, and returned.
    pub fn traverse_samples(&mut self, sink: &mut dyn SampleSink) -> Result<AudioSize> {
        let swapped = self.info.channels_swapped;
        let max_flush_passes = self.options.max_flush_passes;

        let mut queue = FrameQueue::new(
            &mut self.demuxer,
            &mut self.decoder,
            self.info.stream_index,
            self.options.queue_capacity,
        );

        let mut total: u64 = 0;

        // The most recent frame is held back until the next one is decoded, so that there is a
        // last frame to pass on after the authoritative size is known.
        let mut held: Option<Frame> = None;

        let mut demuxed = fill(&mut queue)?;
        let mut exhausted = false;
        let mut refusals = 0;

        // Drain the queue while the demuxer provides packets.
        loop {
            match queue.dequeue_frame()? {
                Dequeued::Frame(frame) => {
                    refusals = 0;
                    total += frame.n_samples() as u64;

                    if let Some(prev) = held.replace(frame) {
                        sink.append_samples(prev.samples(swapped));
                    }

                    if !demuxed && !queue.is_full() {
                        demuxed = fill(&mut queue)?;
                    }
                }
                Dequeued::NeedRefill if queue.is_empty() => {
                    if demuxed {
                        break;
                    }
                    demuxed = fill(&mut queue)?;
                }
                Dequeued::NeedRefill => {
                    // The decoder refused the packet at the head of the queue. It must emit a
                    // frame before it accepts more input.
                    refusals += 1;

                    if refusals > MAX_CONSECUTIVE_REFUSALS {
                        return decode_error("session: decoder refuses queued packets");
                    }

                    debug!("decoder refused a packet, {} queued", queue.size());
                }
                Dequeued::Exhausted => {
                    exhausted = true;
                    break;
                }
            }
        }

        let mut flushed: Vec<Frame> = held.into_iter().collect();

        // Flush the decoder. A decoder with delay is told about the end of the stream again as
        // long as it keeps emitting samples.
        if !exhausted {
            let mut passes = 0;

            loop {
                let before = total;

                if queue.flush()? == SendStatus::Closed && passes == 0 {
                    debug!("decoder was closed before flushing");
                }

                passes += 1;

                loop {
                    match queue.dequeue_frame()? {
                        Dequeued::Frame(frame) => {
                            total += frame.n_samples() as u64;
                            flushed.push(frame);
                        }
                        Dequeued::NeedRefill => break,
                        Dequeued::Exhausted => {
                            exhausted = true;
                            break;
                        }
                    }
                }

                if exhausted || total == before || !queue.decoder_has_delay() {
                    break;
                }

                if passes >= max_flush_passes {
                    warn!("decoder still emits samples after {} flush passes", passes);
                    break;
                }

                debug!("flush pass {} yielded {} samples", passes, total - before);
            }
        }

        let size = AudioSize::from_samples(total);

        sink.update_audiosize(size);

        for frame in &flushed {
            sink.append_samples(frame.samples(swapped));
        }

        Ok(size)
    }

    /// Decodes the whole stream and passes the samples to `sink`, framed by the start and end of
    /// the input.
    pub fn process(&mut self, sink: &mut dyn SampleSink) -> Result<AudioSize> {
        let declared = self.info.declared_size;

        sink.start_input();
        sink.update_audiosize(declared);

        let size = self.traverse_samples(sink)?;

        sink.end_input();

        log_discrepancy(declared, size);

        Ok(size)
    }
}

/// Fills the queue to capacity. Returns `true` if the demuxer reached the end of the stream.
fn fill<D, C>(queue: &mut FrameQueue<'_, D, C>) -> Result<bool>
where
    D: Demuxer,
    C: FrameDecoder<D::Packet>,
{
    while !queue.is_full() {
        if !queue.enqueue_frame()? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn log_discrepancy(declared: AudioSize, actual: AudioSize) {
    let (expected, encountered) = (declared.samples(), actual.samples());

    match encountered.cmp(&expected) {
        Ordering::Equal => debug!("decoded {} samples as expected", encountered),
        Ordering::Greater => info!(
            "expected {} samples but encountered {} ({} more)",
            expected,
            encountered,
            encountered - expected
        ),
        Ordering::Less => info!(
            "expected {} samples but encountered {} ({} less)",
            expected,
            encountered,
            expected - encountered
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::errors::Error;
    use crate::queue::tests::{counting_frame, CountingDecoder, MockDemuxer, MockPacket};
    use crate::queue::{BufferedDecoder, PacketDecoder, ReceiveStatus};
    use crate::sample::StereoSample;
    use crate::sink::tests::{Event, RecordingSink};

    fn info(declared: u64) -> StreamInfo {
        StreamInfo {
            stream_index: 0,
            sample_format: SampleFormat::S16,
            channels_swapped: false,
            declared_size: AudioSize::from_samples(declared),
        }
    }

    fn session(
        sizes: &[usize],
        declared: u64,
    ) -> DecodeSession<MockDemuxer, BufferedDecoder<CountingDecoder>> {
        DecodeSession::new(
            MockDemuxer::with_sizes(sizes),
            BufferedDecoder::new(CountingDecoder::default()),
            info(declared),
            SessionOptions::default(),
        )
    }

    fn appended(events: &[Event]) -> u64 {
        events.iter().map(|e| if let Event::Samples(n) = e { *n as u64 } else { 0 }).sum()
    }

    #[test]
    fn verify_declared_samples() {
        assert_eq!(declared_samples(1024, 1, 44100, 44100), 1024);
        assert_eq!(declared_samples(2, 1, 1, 44100), 88200);
        assert_eq!(declared_samples(1000, 1, 1000, 44100), 44100);
        assert_eq!(declared_samples(5, 1, 0, 44100), 0);
    }

    #[test]
    fn verify_actual_count_wins_over_declared() {
        // 1025 samples across packet boundaries, but the container declares 1024.
        let mut session = session(&[588, 436, 1], 1024);
        let mut sink = RecordingSink::default();

        let size = session.process(&mut sink).unwrap();

        assert_eq!(size.samples(), 1025);
        assert_eq!(
            sink.events,
            [
                Event::Start,
                Event::Size(1024),
                Event::Samples(588),
                Event::Samples(436),
                Event::Size(1025),
                Event::Samples(1),
                Event::End,
            ]
        );
        assert_eq!(sink.samples.len(), 1025);
        assert_eq!(sink.samples[1024], StereoSample::new(1024, -1024));
    }

    #[test]
    fn verify_ordering_for_many_packets() {
        let sizes: Vec<usize> = (0..40).map(|i| 100 + i).collect();
        let expected: u64 = sizes.iter().map(|&s| s as u64).sum();

        let mut session = session(&sizes, 0);
        let mut sink = RecordingSink::default();

        session.process(&mut sink).unwrap();

        let events = &sink.events;
        assert_eq!(events.first(), Some(&Event::Start));
        assert_eq!(events.last(), Some(&Event::End));

        // The final size precedes the last block of samples and matches the appended count.
        let n = events.len();
        assert_eq!(events[n - 3], Event::Size(expected));
        assert!(matches!(events[n - 2], Event::Samples(_)));
        assert_eq!(appended(events), expected);

        // Samples arrive in order.
        for (i, sample) in sink.samples.iter().enumerate() {
            assert_eq!(sample.left, i as i16 as i32);
        }
    }

    #[test]
    fn verify_empty_stream() {
        let mut session = session(&[], 0);
        let mut sink = RecordingSink::default();

        let size = session.process(&mut sink).unwrap();

        assert!(size.is_zero());
        assert_eq!(sink.events, [Event::Start, Event::Size(0), Event::Size(0), Event::End]);
    }

    #[test]
    fn verify_swapped_channels() {
        let mut session = DecodeSession::new(
            MockDemuxer::with_sizes(&[2]),
            BufferedDecoder::new(CountingDecoder::default()),
            StreamInfo { channels_swapped: true, ..info(2) },
            SessionOptions::default(),
        );
        let mut sink = RecordingSink::default();

        session.process(&mut sink).unwrap();

        assert_eq!(sink.samples, [StereoSample::new(0, 0), StereoSample::new(-1, 1)]);
    }

    #[test]
    fn verify_foreign_streams_are_skipped() {
        let mut packets = Vec::new();
        for i in 0..30 {
            packets.push(MockPacket { stream: 0, samples: 10 });
            if i % 3 == 0 {
                packets.push(MockPacket { stream: 2, samples: 1000 });
            }
        }

        let mut session = DecodeSession::new(
            MockDemuxer::new(&packets),
            BufferedDecoder::new(CountingDecoder::default()),
            info(300),
            SessionOptions { queue_capacity: 4, ..Default::default() },
        );
        let mut sink = RecordingSink::default();

        assert_eq!(session.process(&mut sink).unwrap().samples(), 300);
    }

    /// A decoder that holds back samples until the end of the stream is signalled, and then emits
    /// them in several rounds, one per end-of-stream signal, like codecs with long delay lines.
    struct DelayDecoder {
        counter: usize,
        current: Option<usize>,
        rounds: Vec<usize>,
        eos_signals: usize,
        emitted_in_round: bool,
    }

    impl DelayDecoder {
        fn new(rounds: &[usize]) -> Self {
            DelayDecoder {
                counter: 0,
                current: None,
                rounds: rounds.iter().rev().copied().collect(),
                eos_signals: 0,
                emitted_in_round: true,
            }
        }
    }

    impl FrameDecoder<MockPacket> for DelayDecoder {
        fn send_packet(&mut self, packet: Option<&MockPacket>) -> Result<SendStatus> {
            match packet {
                Some(_) if self.eos_signals > 0 => Ok(SendStatus::Closed),
                Some(_) if self.current.is_some() => Ok(SendStatus::Busy),
                Some(packet) => {
                    self.current = Some(packet.samples);
                    Ok(SendStatus::Accepted)
                }
                None => {
                    self.eos_signals += 1;
                    self.emitted_in_round = false;
                    Ok(SendStatus::Accepted)
                }
            }
        }

        fn receive_frame(&mut self) -> Result<ReceiveStatus> {
            if let Some(n) = self.current.take() {
                let frame = counting_frame(self.counter, n);
                self.counter += n;
                return Ok(ReceiveStatus::Frame(frame));
            }

            if self.eos_signals == 0 {
                return Ok(ReceiveStatus::NeedInput);
            }

            if !self.emitted_in_round {
                self.emitted_in_round = true;
                if let Some(n) = self.rounds.pop() {
                    let frame = counting_frame(self.counter, n);
                    self.counter += n;
                    return Ok(ReceiveStatus::Frame(frame));
                }
            }

            // Wait for the next end-of-stream signal while delayed rounds remain.
            if self.rounds.is_empty() {
                Ok(ReceiveStatus::EndOfStream)
            }
            else {
                Ok(ReceiveStatus::NeedInput)
            }
        }

        fn has_delay(&self) -> bool {
            true
        }
    }

    #[test]
    fn verify_delayed_frames_are_flushed() {
        let mut session = DecodeSession::new(
            MockDemuxer::with_sizes(&[100, 100]),
            DelayDecoder::new(&[7, 5, 3]),
            info(200),
            SessionOptions::default(),
        );
        let mut sink = RecordingSink::default();

        let size = session.process(&mut sink).unwrap();

        assert_eq!(size.samples(), 215);
        assert_eq!(
            sink.events,
            [
                Event::Start,
                Event::Size(200),
                Event::Samples(100),
                Event::Size(215),
                Event::Samples(100),
                Event::Samples(7),
                Event::Samples(5),
                Event::Samples(3),
                Event::End,
            ]
        );
        assert_eq!(appended(&sink.events), 215);
    }

    #[test]
    fn verify_flush_passes_are_bounded() {
        let mut session = DecodeSession::new(
            MockDemuxer::with_sizes(&[10]),
            DelayDecoder::new(&[1; 20]),
            info(10),
            SessionOptions { max_flush_passes: 3, ..Default::default() },
        );
        let mut sink = RecordingSink::default();

        let size = session.process(&mut sink).unwrap();

        assert_eq!(size.samples(), 13);
        assert_eq!(appended(&sink.events), 13);
    }

    /// A decoder that refuses the first `refusals` packets it is given.
    struct RefusingDecoder {
        inner: BufferedDecoder<CountingDecoder>,
        refusals: usize,
    }

    impl RefusingDecoder {
        fn new(refusals: usize) -> Self {
            RefusingDecoder { inner: BufferedDecoder::new(CountingDecoder::default()), refusals }
        }
    }

    impl FrameDecoder<MockPacket> for RefusingDecoder {
        fn send_packet(&mut self, packet: Option<&MockPacket>) -> Result<SendStatus> {
            if packet.is_some() && self.refusals > 0 {
                self.refusals -= 1;
                return Ok(SendStatus::Busy);
            }
            self.inner.send_packet(packet)
        }

        fn receive_frame(&mut self) -> Result<ReceiveStatus> {
            self.inner.receive_frame()
        }

        fn has_delay(&self) -> bool {
            false
        }
    }

    #[test]
    fn verify_refused_packets_are_retried() {
        let mut session = DecodeSession::new(
            MockDemuxer::with_sizes(&[1; 10]),
            RefusingDecoder::new(2),
            info(10),
            SessionOptions { queue_capacity: 2, ..Default::default() },
        );
        let mut sink = RecordingSink::default();

        let size = session.process(&mut sink).unwrap();

        assert_eq!(size.samples(), 10);
        assert_eq!(appended(&sink.events), 10);
        assert_eq!(sink.samples[9], StereoSample::new(9, -9));
    }

    #[test]
    fn verify_stalled_decoder_fails() {
        let mut session = DecodeSession::new(
            MockDemuxer::with_sizes(&[1; 4]),
            RefusingDecoder::new(usize::MAX),
            info(4),
            SessionOptions { queue_capacity: 2, ..Default::default() },
        );
        let mut sink = RecordingSink::default();

        assert!(matches!(session.process(&mut sink), Err(Error::DecodeError(_))));
    }

    /// Tracks how many packets were read but not yet decoded.
    #[derive(Clone, Default)]
    struct Occupancy {
        queued: Rc<Cell<usize>>,
        full: Rc<Cell<usize>>,
    }

    /// A demuxer of `remaining` one-sample packets recording the queue occupancy.
    struct TrackingDemuxer {
        remaining: usize,
        capacity: usize,
        occupancy: Occupancy,
    }

    impl Demuxer for TrackingDemuxer {
        type Packet = MockPacket;

        fn next_packet(&mut self) -> Result<Option<MockPacket>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;

            let queued = self.occupancy.queued.get() + 1;
            self.occupancy.queued.set(queued);

            if queued == self.capacity {
                self.occupancy.full.set(self.occupancy.full.get() + 1);
            }

            Ok(Some(MockPacket { stream: 0, samples: 1 }))
        }

        fn stream_of(&self, packet: &MockPacket) -> u32 {
            packet.stream
        }
    }

    /// A decoder that needs `group` packets for each frame.
    struct GroupingDecoder {
        group: usize,
        pending: usize,
        produced: usize,
        occupancy: Occupancy,
    }

    impl PacketDecoder<MockPacket> for GroupingDecoder {
        fn decode(&mut self, packet: &MockPacket) -> Result<Option<Frame>> {
            self.occupancy.queued.set(self.occupancy.queued.get() - 1);
            self.pending += packet.samples;

            if self.pending < self.group {
                return Ok(None);
            }

            let frame = counting_frame(self.produced, self.pending);
            self.produced += self.pending;
            self.pending = 0;
            Ok(Some(frame))
        }
    }

    #[test]
    fn verify_refill_tops_up_queue() {
        let occupancy = Occupancy::default();

        let demuxer = TrackingDemuxer { remaining: 24, capacity: 4, occupancy: occupancy.clone() };
        let decoder = GroupingDecoder {
            group: 6,
            pending: 0,
            produced: 0,
            occupancy: occupancy.clone(),
        };

        let mut session = DecodeSession::new(
            demuxer,
            BufferedDecoder::new(decoder),
            info(24),
            SessionOptions { queue_capacity: 4, ..Default::default() },
        );
        let mut sink = RecordingSink::default();

        assert_eq!(session.process(&mut sink).unwrap().samples(), 24);

        // Each frame consumes more packets than the queue holds, every refill fills it up.
        assert!(occupancy.full.get() >= 4);
        assert_eq!(occupancy.queued.get(), 0);
    }

    #[test]
    fn verify_stable_flush_yields_nothing() {
        let mut demuxer = MockDemuxer::with_sizes(&[10]);
        let mut decoder = DelayDecoder::new(&[4]);
        let mut queue = FrameQueue::new(&mut demuxer, &mut decoder, 0, 2);

        queue.enqueue_frame().unwrap();
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::Frame(_)));

        queue.flush().unwrap();
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::Frame(_)));
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::Exhausted));

        // Once exhausted, further flushes yield no samples.
        for _ in 0..3 {
            queue.flush().unwrap();
            assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::Exhausted));
        }
    }
}
