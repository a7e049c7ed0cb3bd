//! Error types for the core, following the teacher's pattern of small,
//! `thiserror`-derived enums per concern
//! (`elvis_core::protocol::DemuxError`, `elvis_core::protocols::tcp::tcp_parsing::TcpError`)
//! rather than one catch-all error.

use crate::subflow::PathIndex;

/// An option failed to parse. Per §7, malformed options are never fatal;
/// callers log and continue rather than propagating this out of the
/// segment-processing path.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum OptionError {
    #[error("option length {0} is too short for its subtype")]
    TooShort(usize),
    #[error("unrecognized MPTCP suboption subtype {0}")]
    UnknownSubtype(u8),
    #[error("option length {length} is invalid for subtype {subtype}")]
    BadLength { subtype: u8, length: usize },
}

/// A DSS mapping violation (§4.2 "fatal error for the subflow").
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    #[error("segment [{seq}, {end_seq}) is not covered by the active mapping [{map_subseq}, {map_end})")]
    OutOfWindow {
        seq: u32,
        end_seq: u32,
        map_subseq: u32,
        map_end: u32,
    },
    #[error("DSS checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },
}

/// Failures from the join engine (§4.8).
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("no MCB is registered for token {0:#010x}")]
    UnknownToken(u32),
    #[error("a subflow already claims path index {0}")]
    PathIndexCollision(PathIndex),
    #[error("the MCB has no room for another subflow")]
    NoRoom,
}

/// Errors from MCB creation/attach paths (§7 "Allocation failure
/// mid-create").
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum McbError {
    #[error("a token collision was detected during allocation")]
    TokenCollision,
    #[error("the subflow is already attached to an MCB")]
    AlreadyAttached,
    #[error("the remote address list is full")]
    AddressListFull,
}
