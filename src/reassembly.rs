//! Meta-level reassembly (§4.3): the DSN-contiguous receive queue ready
//! for the application to read, and the DSN-ordered out-of-order queue
//! that holds segments arriving with gaps still open ahead of them.

use crate::message::Message;

/// A segment that has cleared the DSS engine and is positioned in DSN
/// space, waiting either in the receive queue or the ofo queue.
#[derive(Debug, Clone)]
pub struct PendingSegment {
    pub data_seq: u64,
    pub end_data_seq: u64,
    pub text: Message,
    /// Whether this segment's `end_data_seq` includes a data-FIN byte
    /// (§3 "DFIN idempotence").
    pub is_dfin: bool,
}

impl PendingSegment {
    fn len(&self) -> u64 {
        self.end_data_seq - self.data_seq
    }
}

/// The result of [`Reassembly::enqueue`] (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Every byte of the segment had already been delivered.
    Eaten,
    /// The segment advanced `rcv_nxt` and (if contiguous) drained some
    /// of the ofo queue along with it.
    Queued,
    /// The segment was buffered in the ofo queue pending the gap ahead
    /// of it closing.
    BufferedOfo,
    /// The ofo queue was at its configured cap; the segment was
    /// dropped rather than buffered (§4.3 "Backpressure").
    DroppedBackpressure,
}

#[derive(Debug)]
pub struct Reassembly {
    /// Next DSN byte expected; the left edge of both queues.
    rcv_nxt: u64,
    /// Next DSN byte the application has not yet read.
    copied_seq: u64,
    receive_queue: std::collections::VecDeque<PendingSegment>,
    /// Kept sorted by `data_seq` ascending.
    ofo_queue: Vec<PendingSegment>,
    ofo_bytes: usize,
    ofo_cap_bytes: usize,
    /// Set once a DFIN byte has been delivered into the receive queue
    /// (drives the MCB's `ESTABLISHED -> CLOSE_WAIT` transition, §4.6).
    dfin_delivered: bool,
    /// Bytes of the front receive-queue segment already copied out by a
    /// previous `read` call.
    front_offset: usize,
}

impl Reassembly {
    pub fn new(initial_rcv_nxt: u64, ofo_cap_bytes: usize) -> Self {
        Self {
            rcv_nxt: initial_rcv_nxt,
            copied_seq: initial_rcv_nxt,
            receive_queue: Default::default(),
            ofo_queue: Vec::new(),
            ofo_bytes: 0,
            ofo_cap_bytes,
            dfin_delivered: false,
            front_offset: 0,
        }
    }

    pub fn rcv_nxt(&self) -> u64 {
        self.rcv_nxt
    }

    pub fn copied_seq(&self) -> u64 {
        self.copied_seq
    }

    pub fn dfin_delivered(&self) -> bool {
        self.dfin_delivered
    }

    /// §4.3 `enqueue`.
    pub fn enqueue(&mut self, mut segment: PendingSegment) -> EnqueueResult {
        if segment.end_data_seq <= self.rcv_nxt {
            return EnqueueResult::Eaten;
        }

        if segment.data_seq < self.rcv_nxt && self.rcv_nxt <= segment.end_data_seq {
            // Trim off any bytes already delivered before appending.
            if segment.data_seq < self.rcv_nxt {
                let overlap = (self.rcv_nxt - segment.data_seq) as usize;
                segment.text.remove_front(overlap.min(segment.text.len()));
                segment.data_seq = self.rcv_nxt;
            }
            self.rcv_nxt = segment.end_data_seq;
            if segment.is_dfin {
                self.dfin_delivered = true;
            }
            self.receive_queue.push_back(segment);
            self.drain();
            return EnqueueResult::Queued;
        }

        // data_seq > rcv_nxt: belongs in the ofo queue.
        if self.ofo_bytes + segment.text.len() > self.ofo_cap_bytes {
            tracing::warn!(
                data_seq = segment.data_seq,
                "dropping out-of-order segment, ofo queue at capacity"
            );
            return EnqueueResult::DroppedBackpressure;
        }
        self.insert_ofo(segment);
        EnqueueResult::BufferedOfo
    }

    fn insert_ofo(&mut self, segment: PendingSegment) {
        let mut idx = self
            .ofo_queue
            .partition_point(|s| s.data_seq < segment.data_seq);

        // Merge/trim against the segment immediately before, if it
        // overlaps.
        if idx > 0 {
            let prev = &self.ofo_queue[idx - 1];
            if prev.end_data_seq > segment.data_seq {
                if prev.end_data_seq >= segment.end_data_seq {
                    // prev is a superset; the new segment is redundant.
                    return;
                }
            }
        }

        // Remove/trim any overlapped segments after the insertion point:
        // newer supersedes an overlapped segment when its range is a
        // strict superset, otherwise whichever segment covers the
        // earliest byte wins and the later one is trimmed (§4.3).
        while idx < self.ofo_queue.len() && self.ofo_queue[idx].data_seq < segment.end_data_seq {
            let existing = &self.ofo_queue[idx];
            if segment.data_seq <= existing.data_seq && segment.end_data_seq >= existing.end_data_seq {
                self.ofo_bytes -= self.ofo_queue[idx].text.len();
                self.ofo_queue.remove(idx);
                continue;
            }
            // existing covers the earliest byte (it starts no later
            // than segment and isn't a subset): trim segment instead.
            break;
        }

        self.ofo_bytes += segment.text.len();
        let idx = self
            .ofo_queue
            .partition_point(|s| s.data_seq < segment.data_seq);
        self.ofo_queue.insert(idx, segment);
    }

    /// §4.3 `drain`: walk the ofo queue while its head is contiguous.
    fn drain(&mut self) {
        while let Some(head) = self.ofo_queue.first() {
            if head.data_seq > self.rcv_nxt {
                break;
            }
            let mut head = self.ofo_queue.remove(0);
            self.ofo_bytes -= head.text.len();
            if head.data_seq < self.rcv_nxt {
                let overlap = (self.rcv_nxt - head.data_seq) as usize;
                head.text.remove_front(overlap.min(head.text.len()));
                head.data_seq = self.rcv_nxt;
            }
            if head.end_data_seq <= self.rcv_nxt {
                continue;
            }
            self.rcv_nxt = head.end_data_seq;
            if head.is_dfin {
                self.dfin_delivered = true;
            }
            self.receive_queue.push_back(head);
        }
    }

    /// §4.3 `read`: copies up to `buf.len()` bytes starting at
    /// `copied_seq` and returns how many bytes were copied plus whether
    /// a DFIN was consumed in the process (EOF). When `peek` is set the
    /// queue is left untouched.
    pub fn read(&mut self, buf: &mut [u8], peek: bool) -> (usize, bool) {
        let mut written = 0;
        let mut eof = false;
        let mut offset = self.front_offset;
        let mut pop_count = 0;

        for segment in self.receive_queue.iter() {
            let bytes = segment.text.as_slice();
            let data_len = segment.len() as usize - segment.is_dfin as usize;
            while offset < data_len && written < buf.len() {
                buf[written] = bytes[offset];
                written += 1;
                offset += 1;
            }
            if offset < data_len {
                break;
            }
            pop_count += 1;
            offset = 0;
            if segment.is_dfin {
                eof = true;
                break;
            }
        }

        if !peek {
            self.front_offset = offset;
            for _ in 0..pop_count {
                self.receive_queue.pop_front();
            }
            self.copied_seq += written as u64 + eof as u64;
        }

        (written, eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(data_seq: u64, text: &[u8], dfin: bool) -> PendingSegment {
        PendingSegment {
            data_seq,
            end_data_seq: data_seq + text.len() as u64 + dfin as u64,
            text: Message::new(text.to_vec()),
            is_dfin: dfin,
        }
    }

    #[test]
    fn in_order_segment_advances_rcv_nxt() {
        let mut r = Reassembly::new(0, 1 << 20);
        assert_eq!(r.enqueue(seg(0, b"hello", false)), EnqueueResult::Queued);
        assert_eq!(r.rcv_nxt(), 5);
    }

    #[test]
    fn duplicate_is_eaten() {
        let mut r = Reassembly::new(10, 1 << 20);
        assert_eq!(r.enqueue(seg(0, b"hello", false)), EnqueueResult::Eaten);
    }

    #[test]
    fn gap_buffers_then_drains_on_fill() {
        let mut r = Reassembly::new(0, 1 << 20);
        assert_eq!(r.enqueue(seg(5, b"world", false)), EnqueueResult::BufferedOfo);
        assert_eq!(r.rcv_nxt(), 0);
        assert_eq!(r.enqueue(seg(0, b"hello", false)), EnqueueResult::Queued);
        assert_eq!(r.rcv_nxt(), 10);
    }

    #[test]
    fn read_drains_application_bytes_in_order() {
        let mut r = Reassembly::new(0, 1 << 20);
        r.enqueue(seg(0, b"hello", false));
        let mut buf = [0u8; 5];
        let (n, eof) = r.read(&mut buf, false);
        assert_eq!(n, 5);
        assert!(!eof);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn dfin_signals_eof_after_final_bytes() {
        let mut r = Reassembly::new(0, 1 << 20);
        r.enqueue(seg(0, b"bye!", true));
        assert!(r.dfin_delivered());
        let mut buf = [0u8; 8];
        let (n, eof) = r.read(&mut buf, false);
        assert_eq!(n, 4);
        assert!(eof);
        assert_eq!(r.copied_seq(), 5);
    }

    #[test]
    fn superset_ofo_segment_replaces_subset() {
        let mut r = Reassembly::new(0, 1 << 20);
        r.enqueue(seg(5, b"wo", false));
        r.enqueue(seg(5, b"world", false));
        // Filling the initial gap should drain the full 5-byte segment,
        // not the 2-byte one that was superseded.
        r.enqueue(seg(0, b"hello", false));
        assert_eq!(r.rcv_nxt(), 10);
    }

    #[test]
    fn backpressure_drops_when_ofo_queue_is_full() {
        let mut r = Reassembly::new(0, 4);
        assert_eq!(
            r.enqueue(seg(10, b"hello", false)),
            EnqueueResult::DroppedBackpressure
        );
    }
}
