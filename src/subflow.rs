//! Subflows and the subflow registry (§3's "Subflow" data model, §4.5).
//!
//! The ordinary single-flow TCP state machine itself — congestion
//! control, retransmission timers, SACK processing, ACK generation — is
//! an external collaborator (§1): [`Subflow`] carries only the fields
//! the meta layer needs to read or mutate, named after their kernel
//! counterparts for continuity with `spec.md`.

use crate::address::Socket;
use crate::dss::{InfiniteMapping, Mapping};
use std::collections::VecDeque;
use std::time::Duration;

/// A dense, 1-based identifier for a subflow within an MCB (§3). `0`
/// marks a subflow that has not yet been joined to any MCB.
pub type PathIndex = u8;

/// The reserved path index of the master subflow (§3 "Master identity").
pub const MASTER_PATH_INDEX: PathIndex = 1;

/// The subflow-level TCP state visible to the scheduler (§4.4). This is
/// a narrow view of the full RFC 9293 state machine the external
/// collaborator owns; only states the meta layer reasons about appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubflowState {
    SynSent,
    SynReceived,
    Established,
    CloseWait,
    FinWait1,
    FinWait2,
    Closing,
    LastAck,
    TimeWait,
    Closed,
}

/// Congestion state relevant to scheduling (§4.4 candidate filter). The
/// congestion control algorithm itself is out of scope (§1); this is
/// read-only input from that external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CongestionState {
    #[default]
    Open,
    Recovery,
    Loss,
}

/// A single outstanding segment on a subflow's write queue, tracked so
/// reinjection (§4.4) can find and clone what is still unacknowledged.
#[derive(Debug, Clone)]
pub struct WriteQueueEntry {
    pub data_seq: u64,
    pub len: usize,
    pub seq: u32,
    pub end_seq: u32,
    pub sub_seq: u32,
    /// Bitmask of path indices that have carried this segment (§4.4,
    /// §GLOSSARY "Path index").
    pub path_mask: u32,
}

/// A TCP connection participating in an MCB (§3 "Subflow").
#[derive(Debug, Clone)]
pub struct Subflow {
    pub local: Socket,
    pub remote: Socket,

    pub path_index: PathIndex,
    /// Distinguishes the master (`false`) from a joined subflow
    /// (`true`).
    pub slave_sk: bool,
    /// Temporarily disqualified from scheduling after reinjection
    /// (§4.4, §GLOSSARY "PF state").
    pub pf: bool,
    /// Currently a member of an MCB's subflow list (§4.5).
    pub attached: bool,
    /// Both sides have advertised `MP_CAPABLE` (§3).
    pub mpc: bool,
    /// Carry `MP_CAPABLE` on the next outgoing SYN-stage ACK (§3).
    pub include_mpc: bool,

    pub state: SubflowState,
    pub congestion: CongestionState,

    pub snd_nxt: u32,
    pub snd_una: u32,
    pub rcv_nxt: u32,
    pub cwnd: u32,
    pub in_flight: u32,
    pub srtt: Duration,
    pub mss: u16,

    pub mapping: Mapping,
    pub infinite: InfiniteMapping,

    pub window_clamp: u32,
    pub rcv_ssthresh: u32,
    pub sk_rcvbuf: u32,
    pub sk_sndbuf: u32,

    pub write_queue: VecDeque<WriteQueueEntry>,
}

impl Subflow {
    /// Creates the master subflow for a freshly-opened MCB.
    pub fn master(local: Socket, remote: Socket, iss: u32, mss: u16) -> Self {
        Self {
            local,
            remote,
            path_index: MASTER_PATH_INDEX,
            slave_sk: false,
            pf: false,
            attached: false,
            mpc: false,
            include_mpc: false,
            state: SubflowState::SynSent,
            congestion: CongestionState::default(),
            snd_nxt: iss,
            snd_una: iss,
            rcv_nxt: 0,
            cwnd: mss as u32 * 4,
            in_flight: 0,
            srtt: Duration::from_millis(100),
            mss,
            mapping: Mapping::default(),
            infinite: InfiniteMapping::default(),
            window_clamp: 65535,
            rcv_ssthresh: 65535,
            sk_rcvbuf: 87380,
            sk_sndbuf: 87380,
            write_queue: VecDeque::new(),
        }
    }

    /// Creates a joined subflow, not yet attached to any MCB's list.
    pub fn joined(local: Socket, remote: Socket, iss: u32, mss: u16) -> Self {
        let mut sf = Self::master(local, remote, iss, mss);
        sf.slave_sk = true;
        sf.path_index = 0;
        sf
    }

    /// §4.4 candidate filter, minus the MCB-wide `noneligible` mask
    /// which the scheduler applies separately since it isn't a property
    /// of the subflow itself.
    pub fn schedulable(&self) -> bool {
        matches!(self.state, SubflowState::Established | SubflowState::CloseWait)
            && !self.pf
            && self.congestion != CongestionState::Loss
            && self.in_flight < self.cwnd
    }

    /// §4.4 "Write-queue bookkeeping": appends a segment to the write
    /// queue, (re)stamping its subflow sequence numbers. The DSN is
    /// unchanged by this call — only the caller knows it.
    pub fn skb_entail(&mut self, data_seq: u64, len: usize) -> WriteQueueEntry {
        let seq = self.snd_nxt;
        let end_seq = seq.wrapping_add(len as u32);
        self.snd_nxt = end_seq;
        let entry = WriteQueueEntry {
            data_seq,
            len,
            seq,
            end_seq,
            sub_seq: seq,
            path_mask: 1 << self.path_index.max(1),
        };
        self.write_queue.push_back(entry.clone());
        entry
    }
}

/// Aggregated receive/send buffer sizes recomputed on every subflow
/// change (§4.5 "Aggregated buffers").
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatedBuffers {
    pub window_clamp: u32,
    pub rcv_ssthresh: u32,
    pub sk_rcvbuf: u32,
    pub sk_sndbuf: u32,
}

impl AggregatedBuffers {
    pub fn recompute<'a>(subflows: impl Iterator<Item = &'a Subflow>) -> Self {
        let mut out = Self::default();
        for sf in subflows {
            out.window_clamp += sf.window_clamp;
            out.rcv_ssthresh += sf.rcv_ssthresh;
            out.sk_rcvbuf += sf.sk_rcvbuf;
            out.sk_sndbuf += sf.sk_sndbuf;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(port: u16) -> Socket {
        Socket::new("127.0.0.1".parse().unwrap(), port)
    }

    #[test]
    fn master_starts_with_path_index_one() {
        let sf = Subflow::master(socket(1), socket(2), 0, 1460);
        assert_eq!(sf.path_index, MASTER_PATH_INDEX);
        assert!(!sf.slave_sk);
    }

    #[test]
    fn schedulable_requires_established_and_room() {
        let mut sf = Subflow::master(socket(1), socket(2), 0, 1460);
        sf.state = SubflowState::Established;
        assert!(sf.schedulable());
        sf.in_flight = sf.cwnd;
        assert!(!sf.schedulable());
        sf.in_flight = 0;
        sf.pf = true;
        assert!(!sf.schedulable());
    }

    #[test]
    fn skb_entail_advances_snd_nxt_without_touching_dsn() {
        let mut sf = Subflow::master(socket(1), socket(2), 100, 1460);
        sf.path_index = 2;
        let entry = sf.skb_entail(5000, 50);
        assert_eq!(entry.seq, 100);
        assert_eq!(entry.end_seq, 150);
        assert_eq!(entry.data_seq, 5000);
        assert_eq!(sf.snd_nxt, 150);
    }

    #[test]
    fn aggregated_buffers_sum_across_subflows() {
        let mut a = Subflow::master(socket(1), socket(2), 0, 1460);
        a.sk_rcvbuf = 100;
        let mut b = Subflow::joined(socket(3), socket(4), 0, 1460);
        b.sk_rcvbuf = 200;
        let agg = AggregatedBuffers::recompute([&a, &b].into_iter());
        assert_eq!(agg.sk_rcvbuf, 300);
    }
}
