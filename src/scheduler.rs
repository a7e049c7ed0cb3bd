//! The send-side scheduler and reinjection path (§4.4): chooses which
//! subflow carries a given meta segment, and clones data from a failing
//! subflow onto the MCB's reinject queue.

use crate::message::Message;
use crate::subflow::{PathIndex, Subflow};
use std::collections::VecDeque;

/// A segment cloned onto the reinject queue after its original subflow
/// was believed to be failing (§4.4 "Reinjection").
#[derive(Debug, Clone)]
pub struct ReinjectEntry {
    pub data_seq: u64,
    pub text: Message,
    /// Path indices that have already carried this segment; a subflow
    /// whose index is already set here gets nothing new from
    /// retransmitting it.
    pub path_mask: u32,
}

/// The MCB's reinject queue (§3).
#[derive(Debug, Default)]
pub struct ReinjectQueue {
    entries: VecDeque<ReinjectEntry>,
}

impl ReinjectQueue {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entry: ReinjectEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop_front(&mut self) -> Option<ReinjectEntry> {
        self.entries.pop_front()
    }

    pub fn peek_front(&self) -> Option<&ReinjectEntry> {
        self.entries.front()
    }
}

/// What `next_segment` selected (§4.4 "Next-segment pick").
#[derive(Debug, Clone)]
pub struct NextSegment {
    pub entry: ReinjectEntry,
    pub reinject: bool,
}

/// §4.4 "Next-segment pick": the reinject queue always wins when
/// non-empty; otherwise the caller's ordinary meta send-head (passed in
/// as a thunk so a queue with nothing to send needn't allocate).
pub fn next_segment(
    reinject_queue: &mut ReinjectQueue,
    meta_send_head: impl FnOnce() -> Option<ReinjectEntry>,
) -> Option<NextSegment> {
    if let Some(entry) = reinject_queue.pop_front() {
        return Some(NextSegment {
            entry,
            reinject: true,
        });
    }
    meta_send_head().map(|entry| NextSegment {
        entry,
        reinject: false,
    })
}

/// §4.4 candidate collection + smallest-srtt pick. `noneligible_mask`
/// has one bit per path index the MCB has temporarily disqualified.
/// Backup paths (§6's `b` bit, carried on [`crate::subflow::Subflow`]
/// indirectly through the path manager) are excluded from `backup_mask`
/// unless they are all that remains, mirroring the kernel's preference
/// for non-backup paths.
pub fn pick_subflow<'a>(
    subflows: impl Iterator<Item = &'a Subflow>,
    noneligible_mask: u32,
    backup_mask: u32,
) -> Option<usize> {
    let candidates: Vec<(usize, &Subflow)> = subflows
        .enumerate()
        .filter(|(_, sf)| {
            sf.schedulable() && noneligible_mask & (1 << sf.path_index.min(31)) == 0
        })
        .collect();

    let non_backup: Vec<_> = candidates
        .iter()
        .filter(|(_, sf)| backup_mask & (1 << sf.path_index.min(31)) == 0)
        .collect();
    let pool: &[(usize, &Subflow)] = if non_backup.is_empty() {
        &candidates
    } else {
        // Reborrow through a owned Vec so both branches share a type.
        return non_backup
            .iter()
            .min_by_key(|(_, sf)| sf.srtt)
            .map(|(idx, _)| *idx);
    };

    if pool.len() == 1 {
        return Some(pool[0].0);
    }
    pool.iter().min_by_key(|(_, sf)| sf.srtt).map(|(idx, _)| *idx)
}

/// §4.4 "Reinjection": called when the external TCP layer above decided
/// `subflow` is failing. Clones every segment still on its write queue
/// onto `reinject_queue`, tagging the subflow's path index into each
/// segment's mask, skipping a segment only when every path index in
/// `live_path_indices` already appears in its mask. Marks `subflow` as
/// `pf` (§3 "PF state"). The write queue only stores accounting, not the
/// payload bytes (those live in the meta retransmit queue), so the
/// caller supplies a `texts` lookup to fetch each segment's bytes by
/// data sequence number.
pub fn reinject_with_text(
    subflow: &mut Subflow,
    reinject_queue: &mut ReinjectQueue,
    live_path_indices: &[PathIndex],
    texts: impl Fn(u64) -> Option<Message>,
) {
    subflow.pf = true;
    let bit = 1u32 << subflow.path_index.min(31);
    for segment in subflow.write_queue.iter_mut() {
        segment.path_mask |= bit;
        let nothing_left = live_path_indices
            .iter()
            .all(|pi| segment.path_mask & (1 << (*pi).min(31)) != 0);
        if nothing_left {
            continue;
        }
        if let Some(text) = texts(segment.data_seq) {
            reinject_queue.push(ReinjectEntry {
                data_seq: segment.data_seq,
                text,
                path_mask: segment.path_mask,
            });
        }
    }
}
