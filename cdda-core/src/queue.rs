// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `queue` module drives a packet based demuxer and decoder pair.
//!
//! A [`Demuxer`] reads encoded packets from a container, a [`FrameDecoder`] turns packets into
//! decoded [`Frame`]s. The two do not operate in lockstep: a decoder may need several packets
//! before it emits a frame, emit several frames for one packet, or hold back frames until it is
//! told that the stream ended. The [`FrameQueue`] buffers packets between the two and implements
//! the input, output, and end-of-stream protocol of the decoder.

use std::collections::VecDeque;

use log::debug;

use crate::audio::Frame;
use crate::errors::{decode_error, Result};

/// A `Demuxer` reads encoded packets from a container.
pub trait Demuxer {
    type Packet;

    /// Reads the next packet. Returns `Ok(None)` at the end of the stream.
    fn next_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// The index of the stream `packet` belongs to.
    fn stream_of(&self, packet: &Self::Packet) -> u32;
}

/// The outcome of submitting input to a [`FrameDecoder`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The input was consumed.
    Accepted,
    /// The decoder does not accept input right now. Frames must be received first.
    Busy,
    /// The decoder was already told that the stream ended.
    Closed,
}

/// The outcome of requesting a frame from a [`FrameDecoder`].
#[derive(Debug)]
pub enum ReceiveStatus {
    /// A decoded frame.
    Frame(Frame),
    /// The decoder needs another packet before it can emit a frame.
    NeedInput,
    /// The decoder emitted all frames and will not emit any more.
    EndOfStream,
}

/// A `FrameDecoder` decodes packets of type `P` into frames.
pub trait FrameDecoder<P> {
    /// Submits a packet. `None` signals the end of the stream, after which the decoder emits any
    /// frames it held back.
    fn send_packet(&mut self, packet: Option<&P>) -> Result<SendStatus>;

    /// Requests the next decoded frame.
    fn receive_frame(&mut self) -> Result<ReceiveStatus>;

    /// Returns `true` if the decoder may hold back frames until the end of the stream is
    /// signalled, possibly more than once.
    fn has_delay(&self) -> bool;
}

/// A `PacketDecoder` decodes each packet into at most one frame, synchronously.
pub trait PacketDecoder<P> {
    fn decode(&mut self, packet: &P) -> Result<Option<Frame>>;
}

/// `BufferedDecoder` adapts a [`PacketDecoder`] to the [`FrameDecoder`] protocol.
///
/// The decoded frame of a packet is held until it is received. While a frame is pending, further
/// packets are refused as busy.
pub struct BufferedDecoder<T> {
    inner: T,
    pending: Option<Frame>,
    closed: bool,
}

impl<T> BufferedDecoder<T> {
    pub fn new(inner: T) -> Self {
        BufferedDecoder { inner, pending: None, closed: false }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<P, T: PacketDecoder<P>> FrameDecoder<P> for BufferedDecoder<T> {
    fn send_packet(&mut self, packet: Option<&P>) -> Result<SendStatus> {
        if self.closed {
            return Ok(SendStatus::Closed);
        }

        let Some(packet) = packet
        else {
            self.closed = true;
            return Ok(SendStatus::Accepted);
        };

        if self.pending.is_some() {
            return Ok(SendStatus::Busy);
        }

        // Empty frames carry no samples and are dropped.
        self.pending = self.inner.decode(packet)?.filter(|frame| !frame.is_empty());

        Ok(SendStatus::Accepted)
    }

    fn receive_frame(&mut self) -> Result<ReceiveStatus> {
        match self.pending.take() {
            Some(frame) => Ok(ReceiveStatus::Frame(frame)),
            None if self.closed => Ok(ReceiveStatus::EndOfStream),
            None => Ok(ReceiveStatus::NeedInput),
        }
    }

    fn has_delay(&self) -> bool {
        false
    }
}

/// The outcome of [`FrameQueue::dequeue_frame`].
#[derive(Debug)]
pub enum Dequeued {
    /// A decoded frame.
    Frame(Frame),
    /// The decoder needs input but the queue cannot provide it. The queue must be refilled with
    /// [`FrameQueue::enqueue_frame`] before retrying.
    NeedRefill,
    /// The decoder will not emit any more frames.
    Exhausted,
}

/// The default capacity of a [`FrameQueue`] in packets.
pub const DEFAULT_QUEUE_CAPACITY: usize = 12;

/// A `FrameQueue` is a bounded buffer of packets between a demuxer and a decoder.
///
/// The queue borrows the demuxer and decoder for its lifetime. Packets of streams other than the
/// one being decoded are discarded when read. A packet leaves the queue exactly once, when the
/// decoder accepts it.
pub struct FrameQueue<'a, D: Demuxer, C> {
    demuxer: &'a mut D,
    decoder: &'a mut C,
    stream_index: u32,
    packets: VecDeque<D::Packet>,
    capacity: usize,
}

impl<'a, D, C> FrameQueue<'a, D, C>
where
    D: Demuxer,
    C: FrameDecoder<D::Packet>,
{
    /// Instantiate a `FrameQueue` feeding packets of stream `stream_index` from `demuxer` to
    /// `decoder`.
    pub fn new(demuxer: &'a mut D, decoder: &'a mut C, stream_index: u32, capacity: usize) -> Self {
        let capacity = capacity.max(1);

        FrameQueue {
            demuxer,
            decoder,
            stream_index,
            packets: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Reads the next packet of the decoded stream into the queue.
    ///
    /// Returns `Ok(false)` if the demuxer reached the end of the stream.
    pub fn enqueue_frame(&mut self) -> Result<bool> {
        loop {
            let Some(packet) = self.demuxer.next_packet()?
            else {
                return Ok(false);
            };

            let stream = self.demuxer.stream_of(&packet);

            if stream != self.stream_index {
                debug!("ignoring packet of stream {}", stream);
                continue;
            }

            self.packets.push_back(packet);
            return Ok(true);
        }
    }

    /// Requests a frame from the decoder, feeding it queued packets as required.
    pub fn dequeue_frame(&mut self) -> Result<Dequeued> {
        loop {
            match self.decoder.receive_frame()? {
                ReceiveStatus::Frame(frame) => return Ok(Dequeued::Frame(frame)),
                ReceiveStatus::EndOfStream => return Ok(Dequeued::Exhausted),
                ReceiveStatus::NeedInput => (),
            }

            let Some(packet) = self.packets.front()
            else {
                return Ok(Dequeued::NeedRefill);
            };

            match self.decoder.send_packet(Some(packet))? {
                SendStatus::Accepted => {
                    self.packets.pop_front();
                }
                SendStatus::Busy => return Ok(Dequeued::NeedRefill),
                SendStatus::Closed => {
                    return decode_error("queue: decoder does not accept input after end of stream")
                }
            }
        }
    }

    /// Signals the end of the stream to the decoder.
    pub fn flush(&mut self) -> Result<SendStatus> {
        self.decoder.send_packet(None)
    }

    /// Returns `true` if the decoder may hold back frames until the end of the stream.
    pub fn decoder_has_delay(&self) -> bool {
        self.decoder.has_delay()
    }

    /// The number of queued packets.
    pub fn size(&self) -> usize {
        self.packets.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.packets.len() >= self.capacity
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A packet of a mock stream: its stream index and the number of samples it decodes to.
    #[derive(Clone, Debug)]
    pub struct MockPacket {
        pub stream: u32,
        pub samples: usize,
    }

    /// A demuxer returning a fixed list of packets.
    pub struct MockDemuxer {
        pub packets: VecDeque<MockPacket>,
        pub reads: usize,
    }

    impl MockDemuxer {
        pub fn new(packets: &[MockPacket]) -> Self {
            MockDemuxer { packets: packets.iter().cloned().collect(), reads: 0 }
        }

        /// A demuxer for stream 0 returning packets of the given sizes.
        pub fn with_sizes(sizes: &[usize]) -> Self {
            let packets: Vec<_> =
                sizes.iter().map(|&samples| MockPacket { stream: 0, samples }).collect();
            MockDemuxer::new(&packets)
        }
    }

    impl Demuxer for MockDemuxer {
        type Packet = MockPacket;

        fn next_packet(&mut self) -> Result<Option<MockPacket>> {
            self.reads += 1;
            Ok(self.packets.pop_front())
        }

        fn stream_of(&self, packet: &MockPacket) -> u32 {
            packet.stream
        }
    }

    /// Builds a frame of `n` samples whose left channel counts up from `start`.
    pub fn counting_frame(start: usize, n: usize) -> Frame {
        let pcm: Vec<i16> =
            (start..start + n).flat_map(|i| [i as i16, -(i as i16)]).collect();
        Frame::from_interleaved_i16(&pcm)
    }

    /// A packet decoder numbering the samples it produces consecutively.
    #[derive(Default)]
    pub struct CountingDecoder {
        pub produced: usize,
    }

    impl PacketDecoder<MockPacket> for CountingDecoder {
        fn decode(&mut self, packet: &MockPacket) -> Result<Option<Frame>> {
            let frame = counting_frame(self.produced, packet.samples);
            self.produced += packet.samples;
            Ok(Some(frame))
        }
    }

    #[test]
    fn verify_foreign_packets_are_discarded() {
        let mut demuxer = MockDemuxer::new(&[
            MockPacket { stream: 1, samples: 7 },
            MockPacket { stream: 0, samples: 3 },
            MockPacket { stream: 1, samples: 7 },
        ]);
        let mut decoder = BufferedDecoder::new(CountingDecoder::default());

        let mut queue = FrameQueue::new(&mut demuxer, &mut decoder, 0, 4);

        assert!(queue.enqueue_frame().unwrap());
        assert_eq!(queue.size(), 1);
        assert!(!queue.enqueue_frame().unwrap());
        assert_eq!(queue.size(), 1);

        match queue.dequeue_frame().unwrap() {
            Dequeued::Frame(frame) => assert_eq!(frame.n_samples(), 3),
            other => panic!("unexpected {:?}", other),
        }

        assert!(queue.is_empty());
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::NeedRefill));

        assert_eq!(queue.flush().unwrap(), SendStatus::Accepted);
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::Exhausted));
        assert_eq!(queue.flush().unwrap(), SendStatus::Closed);
    }

    /// A decoder that refuses the first packet it is offered.
    struct StubbornDecoder {
        inner: BufferedDecoder<CountingDecoder>,
        refused: bool,
    }

    impl FrameDecoder<MockPacket> for StubbornDecoder {
        fn send_packet(&mut self, packet: Option<&MockPacket>) -> Result<SendStatus> {
            if packet.is_some() && !self.refused {
                self.refused = true;
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
    fn verify_busy_decoder_keeps_packet() {
        let mut demuxer = MockDemuxer::with_sizes(&[2, 5]);
        let mut decoder = StubbornDecoder {
            inner: BufferedDecoder::new(CountingDecoder::default()),
            refused: false,
        };

        let mut queue = FrameQueue::new(&mut demuxer, &mut decoder, 0, 4);
        queue.enqueue_frame().unwrap();
        queue.enqueue_frame().unwrap();

        // The refused packet stays at the head of the queue.
        assert!(matches!(queue.dequeue_frame().unwrap(), Dequeued::NeedRefill));
        assert_eq!(queue.size(), 2);

        let mut sizes = Vec::new();

        while let Dequeued::Frame(frame) = queue.dequeue_frame().unwrap() {
            sizes.push(frame.n_samples());
        }

        assert_eq!(sizes, [2, 5]);
        assert!(queue.is_empty());
    }
}
