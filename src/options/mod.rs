//! MPTCP TCP suboptions (§4.1, §6).
//!
//! Layout and lengths follow the draft-era kernel source this design is
//! grounded on (`include/net/mptcp.h`'s `mp_capable`/`mp_join`/`mp_dss`/
//! `mp_add_addr`/`mp_fail` structs), not the final RFC 6824/8684 — per
//! §1's Non-goals, this is preserved verbatim rather than modernized.

pub mod codec;
pub mod emit;

pub use codec::{parse_suboption, scan_tcp_options, RxOptionState, SegmentMeta};

/// The TCP option kind this implementation uses for all MPTCP
/// suboptions, matching the draft-era out-of-tree kernel patch.
pub const MPTCP_OPTION_KIND: u8 = 30;

/// Suboption subtypes (§4.1 table), the high nibble of the first content
/// byte after kind/length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubType {
    MpCapable = 0,
    MpJoin = 1,
    Dss = 2,
    AddAddr = 3,
    MpFail = 6,
}

impl SubType {
    pub fn from_nibble(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::MpCapable),
            1 => Some(Self::MpJoin),
            2 => Some(Self::Dss),
            3 => Some(Self::AddAddr),
            6 => Some(Self::MpFail),
            _ => None,
        }
    }
}

/// A parsed `MP_CAPABLE` option (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpCapable {
    pub checksum_requested: bool,
    pub sender_key: u64,
    /// Present only on the ACK-stage (20 byte) form.
    pub receiver_key: Option<u64>,
}

/// A parsed `MP_JOIN` option. The HMAC itself is carried as an opaque
/// byte array: computing/verifying it is an external collaborator's
/// concern (§1), this core only validates structural presence/length.
#[derive(Debug, Clone, Copy)]
pub struct MpJoin {
    pub backup: bool,
    pub addr_id: u8,
    /// SYN stage: 32-bit receiver token. SYN-ACK/ACK stage: part of the
    /// nonce/HMAC exchange instead; which fields are valid is
    /// distinguished by `stage`.
    pub stage: MpJoinStage,
}

#[derive(Debug, Clone, Copy)]
pub enum MpJoinStage {
    Syn { receiver_token: u32, sender_nonce: u32 },
    SynAck { sender_hmac: [u8; 8], sender_nonce: u32 },
    Ack { sender_hmac: [u8; 20] },
}

/// A parsed `DSS` option (§4.1, §6). Any subset of `data_ack`/`mapping`
/// may be present; `dfin` records whether `F` was set alongside whatever
/// mapping accompanies it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dss {
    pub data_ack: Option<u64>,
    pub mapping: Option<DssMapping>,
    pub dfin: bool,
}

/// The `(data_seq, sub_seq, data_len)` triple carried by `DSS.M` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DssMapping {
    pub data_seq: u64,
    pub sub_seq: u32,
    pub data_len: u16,
    /// The checksum field, present only when the MCB negotiated
    /// checksums (§4.1's 10-vs-12 byte SEQ length).
    pub checksum: Option<u16>,
}

/// A parsed `ADD_ADDR` option (§4.1, §4.7, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAddr {
    pub addr_id: u8,
    pub address: std::net::IpAddr,
    pub port: Option<u16>,
}

/// A parsed `MP_FAIL` option (§4.1, §6). The kernel source truncates the
/// DSN of the failure point to 32 bits; this is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpFail {
    pub data_seq: u32,
}
