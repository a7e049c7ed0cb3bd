//! The meta-connection control block (§3, §4.5, §4.6): the object that
//! owns the subflow list, the meta sequence space, and the
//! reassembly/reinject queues, and the state machine that governs its
//! own lifetime independent of any one subflow's.

use crate::address::Socket;
use crate::dss::{enter_infinite_mapping, should_go_infinite};
use crate::options::codec::RxOptionState;
use crate::pathmanager::{PathEntry, PathManager};
use crate::reassembly::Reassembly;
use crate::scheduler::ReinjectQueue;
use crate::subflow::{AggregatedBuffers, MASTER_PATH_INDEX, PathIndex, Subflow, SubflowState};

/// The MCB's own visible TCP-state (§4.6), distinct from any subflow's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McbState {
    Closed,
    SynSent,
    Established,
    CloseWait,
    FinWait1,
    FinWait2,
    Closing,
    LastAck,
    TimeWait,
}

/// The per-MCB flags word (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct McbFlags {
    pub server_side: bool,
    pub fin_enqueued: bool,
    pub send_infinite_mapping: bool,
    pub infinite_mapping_active: bool,
}

/// Outcome of [`Mcb::fallback`] (§4.6 "Fallback"): the caller is
/// responsible for handing the surviving master subflow back to the
/// ordinary TCP layer.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub master: Subflow,
}

/// Outcome of [`Mcb::note_mapping_fault`] (§9's supplemented `MP_FAIL`
/// round trip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFaultOutcome {
    /// This was the last live subflow; infinite mapping is now active
    /// and no reset is needed.
    WentInfinite,
    /// The faulting subflow was reset and detached; other subflows
    /// continue. Carries the DSN at which the fault was detected so the
    /// caller can emit `MP_FAIL` on a surviving subflow.
    SubflowReset { fail_dsn: u64 },
}

pub struct Mcb {
    pub token: u32,
    pub local_key: u64,
    pub remote_key: u64,

    subflows: Vec<Subflow>,

    pub state: McbState,
    pub flags: McbFlags,

    /// Meta send sequence, in DSN space (§3).
    pub snd_nxt: u64,
    /// Meta acknowledged, in DSN space (§3).
    pub snd_una: u64,

    pub reassembly: Reassembly,
    pub reinject_queue: ReinjectQueue,

    pub path_array: Vec<PathEntry>,
    next_path_index: PathIndex,
    pub pm: PathManager,

    pub rx_options: RxOptionState,

    pub aggregated: AggregatedBuffers,

    /// Path indices the scheduler must skip regardless of per-subflow
    /// state (§4.4 candidate filter's MCB-wide mask).
    pub noneligible_mask: u32,
}

impl Mcb {
    /// Creates an MCB around a freshly-opened master subflow (client
    /// side; §3 "MCB is created when the master subflow's handshake
    /// concludes").
    pub fn new_client(token: u32, local_key: u64, master: Subflow, ofo_cap_bytes: usize) -> Self {
        Self::new(token, local_key, 0, master, false, ofo_cap_bytes)
    }

    /// Creates an MCB for a server-accepted master subflow, adopting the
    /// token already chosen by the SYN-ACK path (§4.6 "Token
    /// allocation").
    pub fn new_server(
        token: u32,
        local_key: u64,
        remote_key: u64,
        master: Subflow,
        ofo_cap_bytes: usize,
    ) -> Self {
        Self::new(token, local_key, remote_key, master, true, ofo_cap_bytes)
    }

    fn new(
        token: u32,
        local_key: u64,
        remote_key: u64,
        mut master: Subflow,
        server_side: bool,
        ofo_cap_bytes: usize,
    ) -> Self {
        master.path_index = MASTER_PATH_INDEX;
        master.attached = true;
        let aggregated = AggregatedBuffers::recompute([&master].into_iter());
        Self {
            token,
            local_key,
            remote_key,
            subflows: vec![master],
            state: McbState::SynSent,
            flags: McbFlags {
                server_side,
                ..Default::default()
            },
            snd_nxt: 0,
            snd_una: 0,
            reassembly: Reassembly::new(0, ofo_cap_bytes),
            reinject_queue: ReinjectQueue::default(),
            path_array: Vec::new(),
            next_path_index: MASTER_PATH_INDEX + 1,
            pm: PathManager::new(),
            rx_options: RxOptionState::default(),
            aggregated,
            noneligible_mask: 0,
        }
    }

    pub fn master(&self) -> &Subflow {
        self.subflows
            .iter()
            .find(|sf| sf.path_index == MASTER_PATH_INDEX)
            .expect("invariant: exactly one master subflow is always present")
    }

    pub fn master_mut(&mut self) -> &mut Subflow {
        self.subflows
            .iter_mut()
            .find(|sf| sf.path_index == MASTER_PATH_INDEX)
            .expect("invariant: exactly one master subflow is always present")
    }

    pub fn subflows(&self) -> impl Iterator<Item = &Subflow> {
        self.subflows.iter()
    }

    pub fn subflows_mut(&mut self) -> impl Iterator<Item = &mut Subflow> {
        self.subflows.iter_mut()
    }

    pub fn find(&self, path_index: PathIndex) -> Option<&Subflow> {
        self.subflows.iter().find(|sf| sf.path_index == path_index)
    }

    pub fn find_mut(&mut self, path_index: PathIndex) -> Option<&mut Subflow> {
        self.subflows.iter_mut().find(|sf| sf.path_index == path_index)
    }

    /// Next path index the MCB hands out to the path manager/join engine
    /// (§3 "next-unused path index counter").
    pub fn next_path_index(&mut self) -> PathIndex {
        let pi = self.next_path_index;
        self.next_path_index = self.next_path_index.saturating_add(1);
        pi
    }

    /// §4.5 "Attaching a subflow". `path_index` must already be assigned
    /// by the caller (PM for a client-initiated join, join engine for a
    /// server-accepted one); `0` is rejected since it marks an unjoined
    /// sock.
    pub fn attach_subflow(&mut self, mut subflow: Subflow) -> Result<(), crate::error::McbError> {
        if subflow.attached {
            return Err(crate::error::McbError::AlreadyAttached);
        }
        if subflow.path_index == 0 {
            return Err(crate::error::McbError::AlreadyAttached);
        }
        if self.subflows.iter().any(|sf| sf.path_index == subflow.path_index) {
            return Err(crate::error::McbError::AlreadyAttached);
        }
        subflow.attached = true;
        if matches!(subflow.state, SubflowState::SynSent | SubflowState::SynReceived) {
            subflow.state = SubflowState::Established;
        }
        self.subflows.push(subflow);
        self.recompute_aggregates();
        Ok(())
    }

    /// §4.5 "Detaching": splice out of the list, keep the MCB alive.
    /// Never detaches the master — a subflow-level reset on the master
    /// is handled by the ordinary TCP layer, not by removing it here.
    pub fn detach_subflow(&mut self, path_index: PathIndex) -> Option<Subflow> {
        if path_index == MASTER_PATH_INDEX {
            return None;
        }
        let idx = self.subflows.iter().position(|sf| sf.path_index == path_index)?;
        let mut removed = self.subflows.remove(idx);
        removed.attached = false;
        self.recompute_aggregates();
        Some(removed)
    }

    fn recompute_aggregates(&mut self) {
        self.aggregated = AggregatedBuffers::recompute(self.subflows.iter());
    }

    /// §4.6 `SYN_SENT -> ESTABLISHED`.
    pub fn note_master_established(&mut self) {
        if self.state == McbState::SynSent && self.master().mpc {
            self.state = McbState::Established;
            tracing::debug!(token = self.token, "MCB established");
        }
    }

    /// §4.6 `ESTABLISHED -> CLOSE_WAIT`: called once [`Reassembly::enqueue`]
    /// has delivered the DFIN byte into the receive queue.
    pub fn note_dfin_consumed(&mut self) {
        if self.state == McbState::Established {
            self.state = McbState::CloseWait;
            tracing::debug!(token = self.token, "MCB close-wait: DFIN consumed");
        }
    }

    /// §4.6 `* -> CLOSED`, application-initiated half.
    pub fn close(&mut self) {
        self.state = McbState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == McbState::Closed
    }

    /// §4.6 "Fallback": the peer never echoed `MP_CAPABLE` in SYN-ACK, or
    /// a mapping fault occurred before any subflow joined. Destroys the
    /// reinject queue, detaches the master, and leaves the MCB closed;
    /// the caller hands `master` back to the ordinary TCP layer.
    pub fn fallback(mut self) -> FallbackOutcome {
        self.reinject_queue = ReinjectQueue::default();
        let master = self
            .subflows
            .iter()
            .position(|sf| sf.path_index == MASTER_PATH_INDEX)
            .map(|idx| self.subflows.remove(idx))
            .expect("invariant: exactly one master subflow is always present");
        tracing::info!(token = self.token, "falling back to plain TCP");
        FallbackOutcome { master }
    }

    /// Whether fallback is still legal per §4.6 ("a mapping fault occurs
    /// before any subflow join"): true once any non-master subflow has
    /// ever attached.
    pub fn has_joined_subflows(&self) -> bool {
        self.subflows.iter().any(|sf| sf.path_index != MASTER_PATH_INDEX)
    }

    /// §9's supplemented `MP_FAIL` round trip combined with §4.6's
    /// "Mapping fault" row: resets the faulting subflow unless it is the
    /// only one left, in which case the connection switches to infinite
    /// mapping instead.
    pub fn note_mapping_fault(&mut self, path_index: PathIndex, fault_dsn: u64) -> MappingFaultOutcome {
        if should_go_infinite(self.subflows.len()) {
            let subseq = self
                .find(path_index)
                .map(|sf| sf.snd_nxt)
                .unwrap_or_default();
            enter_infinite_mapping(&mut self.find_mut(path_index).unwrap().infinite, subseq, fault_dsn);
            self.flags.infinite_mapping_active = true;
            MappingFaultOutcome::WentInfinite
        } else {
            self.detach_subflow(path_index);
            MappingFaultOutcome::SubflowReset { fail_dsn: fault_dsn }
        }
    }

    /// §4.7 "Interface up/down": DOWN marks every subflow on `local` as
    /// pf.
    pub fn mark_local_address_down(&mut self, local: Socket) {
        for sf in self.subflows.iter_mut() {
            if sf.local == local {
                sf.pf = true;
            }
        }
    }

    /// §4.7 "Interface up/down": UP clears pf from any subflow using an
    /// address that was already present.
    pub fn mark_local_address_up(&mut self, local: Socket) {
        for sf in self.subflows.iter_mut() {
            if sf.local == local {
                sf.pf = false;
            }
        }
    }
}
