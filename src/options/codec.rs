//! Parsing and emission for MPTCP suboptions (§4.1).
//!
//! The parser never allocates and only ever mutates the two records the
//! caller supplies; it is safe to call repeatedly for every suboption
//! found while walking a segment's TCP options, mirroring the
//! re-entrancy the teacher's `TcpHeader::from_bytes` gets for free by
//! taking an iterator rather than owning any state (`elvis_core::protocols::tcp::tcp_parsing`).

use super::{AddAddr, Dss, DssMapping, MpCapable, MpFail, MpJoin, MpJoinStage, SubType};
use crate::error::OptionError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Per-segment metadata produced by parsing that segment's options.
/// Reset (or freshly created) once per inbound segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentMeta {
    pub mp_capable: Option<MpCapable>,
    pub mp_join: Option<MpJoin>,
    pub dss: Option<Dss>,
    pub add_addr: Option<AddAddr>,
    pub mp_fail: Option<MpFail>,
    /// Byte offset of the DSS payload from the start of the TCP header,
    /// recorded only when the MCB has negotiated a checksum (§4.1); used
    /// later to locate the bytes folded into the DSS CRC.
    pub dss_csum_offset: Option<usize>,
}

impl SegmentMeta {
    pub fn carries_dfin(&self) -> bool {
        self.dss.map(|dss| dss.dfin).unwrap_or(false)
    }
}

/// The MCB-level accumulator the parser feeds (§3's "per-MCB
/// receive-side options"). The path manager (§4.7) owns turning
/// `pending_add_addr` into vetted `RemoteAddr` entries with NAT/overflow
/// handling; the parser's job stops at structural extraction.
#[derive(Debug, Clone, Default)]
pub struct RxOptionState {
    pub remote_key: Option<u64>,
    pub remote_token: Option<u32>,
    pub checksum_required: bool,
    pub dfin_seen: bool,
    pub fin_dsn: Option<u64>,
    pub pending_add_addr: Vec<AddAddr>,
}

/// Parses a single already-isolated MPTCP suboption (kind byte, length
/// byte, and its payload) and folds the result into `meta`/`rx`.
///
/// `negotiated_checksum` tells the parser whether the connection has
/// negotiated a DSS checksum, which changes how long the DSS `SEQ` block
/// is (§4.1/§6: 10 bytes without a checksum, 12 with).
/// `csum_offset` is the suboption's byte offset from the start of the
/// TCP header, recorded into `meta` only on the `M` branch.
///
/// Malformed lengths are reported via `OptionError` but are never fatal
/// to the segment (§7): callers should log the error and continue.
pub fn parse_suboption(
    bytes: &[u8],
    negotiated_checksum: bool,
    csum_offset: usize,
    meta: &mut SegmentMeta,
    rx: &mut RxOptionState,
) -> Result<(), OptionError> {
    if bytes.len() < 3 {
        return Err(OptionError::TooShort(bytes.len()));
    }
    let length = bytes.len();
    let sub = bytes[2] >> 4;
    let Some(sub) = SubType::from_nibble(sub) else {
        return Err(OptionError::UnknownSubtype(sub));
    };

    match sub {
        SubType::MpCapable => parse_mp_capable(bytes, length, meta, rx),
        SubType::MpJoin => parse_mp_join(bytes, length, meta),
        SubType::Dss => parse_dss(bytes, length, negotiated_checksum, csum_offset, meta, rx),
        SubType::AddAddr => parse_add_addr(bytes, length, meta, rx),
        SubType::MpFail => parse_mp_fail(bytes, length, meta),
    }
}

fn parse_mp_capable(
    bytes: &[u8],
    length: usize,
    meta: &mut SegmentMeta,
    rx: &mut RxOptionState,
) -> Result<(), OptionError> {
    let checksum_requested = bytes[3] & 0b1000_0000 != 0;
    let capable = match length {
        4 => MpCapable {
            checksum_requested,
            sender_key: 0,
            receiver_key: None,
        },
        12 => MpCapable {
            checksum_requested,
            sender_key: u64::from_be_bytes(bytes[4..12].try_into().unwrap()),
            receiver_key: None,
        },
        20 => {
            let sender_key = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
            let receiver_key = u64::from_be_bytes(bytes[12..20].try_into().unwrap());
            rx.remote_key = Some(sender_key);
            MpCapable {
                checksum_requested,
                sender_key,
                receiver_key: Some(receiver_key),
            }
        }
        _ => {
            return Err(OptionError::BadLength {
                subtype: 0,
                length,
            })
        }
    };
    rx.checksum_required = rx.checksum_required || checksum_requested;
    meta.mp_capable = Some(capable);
    Ok(())
}

fn parse_mp_join(bytes: &[u8], length: usize, meta: &mut SegmentMeta) -> Result<(), OptionError> {
    let backup = bytes[2] & 0b0000_0001 != 0;
    let join = match length {
        12 => {
            let addr_id = bytes[3];
            let receiver_token = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
            let sender_nonce = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
            MpJoin {
                backup,
                addr_id,
                stage: MpJoinStage::Syn {
                    receiver_token,
                    sender_nonce,
                },
            }
        }
        16 => {
            let addr_id = bytes[3];
            let mut sender_hmac = [0u8; 8];
            sender_hmac.copy_from_slice(&bytes[4..12]);
            let sender_nonce = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
            MpJoin {
                backup,
                addr_id,
                stage: MpJoinStage::SynAck {
                    sender_hmac,
                    sender_nonce,
                },
            }
        }
        24 => {
            let addr_id = 0;
            let mut sender_hmac = [0u8; 20];
            sender_hmac.copy_from_slice(&bytes[4..24]);
            MpJoin {
                backup,
                addr_id,
                stage: MpJoinStage::Ack { sender_hmac },
            }
        }
        _ => {
            return Err(OptionError::BadLength {
                subtype: 1,
                length,
            })
        }
    };
    meta.mp_join = Some(join);
    Ok(())
}

fn parse_dss(
    bytes: &[u8],
    length: usize,
    negotiated_checksum: bool,
    csum_offset: usize,
    meta: &mut SegmentMeta,
    rx: &mut RxOptionState,
) -> Result<(), OptionError> {
    if length < 4 {
        return Err(OptionError::BadLength {
            subtype: 2,
            length,
        });
    }
    let flags = bytes[3];
    let a_bit = flags & 0b0000_0001 != 0;
    let big_a_bit = flags & 0b0000_0010 != 0;
    let big_m_bit = flags & 0b0000_0100 != 0;
    let _m_bit = flags & 0b0000_1000 != 0;
    let f_bit = flags & 0b0001_0000 != 0;

    let mut offset = 4;
    let mut data_ack = None;
    if a_bit {
        let width = if big_a_bit { 8 } else { 4 };
        if bytes.len() < offset + width {
            return Err(OptionError::BadLength {
                subtype: 2,
                length,
            });
        }
        data_ack = Some(if big_a_bit {
            u64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap())
        } else {
            u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as u64
        });
        offset += width;
    }

    let mut mapping = None;
    if big_m_bit {
        let seq_width = if negotiated_checksum { 12 } else { 10 };
        if bytes.len() < offset + seq_width {
            return Err(OptionError::BadLength {
                subtype: 2,
                length,
            });
        }
        let data_seq = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as u64;
        let sub_seq = u32::from_be_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
        let data_len = u16::from_be_bytes(bytes[offset + 8..offset + 10].try_into().unwrap());
        let checksum = if negotiated_checksum {
            Some(u16::from_be_bytes(
                bytes[offset + 10..offset + 12].try_into().unwrap(),
            ))
        } else {
            None
        };
        mapping = Some(DssMapping {
            data_seq,
            sub_seq,
            data_len,
            checksum,
        });
        meta.dss_csum_offset = negotiated_checksum.then_some(csum_offset);
    }

    if f_bit {
        rx.dfin_seen = true;
        if let Some(m) = mapping {
            rx.fin_dsn = Some(m.data_seq + m.data_len as u64);
        }
    }

    meta.dss = Some(Dss {
        data_ack,
        mapping,
        dfin: f_bit,
    });
    Ok(())
}

fn parse_add_addr(
    bytes: &[u8],
    length: usize,
    meta: &mut SegmentMeta,
    rx: &mut RxOptionState,
) -> Result<(), OptionError> {
    let ipver = bytes[2] & 0b0000_1111;
    let addr_id = bytes[3];
    let (address, base_len) = match ipver {
        4 => {
            if length < 8 {
                return Err(OptionError::BadLength {
                    subtype: 3,
                    length,
                });
            }
            let octets: [u8; 4] = bytes[4..8].try_into().unwrap();
            (IpAddr::V4(Ipv4Addr::from(octets)), 8)
        }
        6 => {
            if length < 20 {
                return Err(OptionError::BadLength {
                    subtype: 3,
                    length,
                });
            }
            let octets: [u8; 16] = bytes[4..20].try_into().unwrap();
            (IpAddr::V6(Ipv6Addr::from(octets)), 20)
        }
        other => return Err(OptionError::BadLength { subtype: other, length }),
    };
    let port = if length >= base_len + 2 {
        Some(u16::from_be_bytes(
            bytes[base_len..base_len + 2].try_into().unwrap(),
        ))
    } else {
        None
    };
    let add_addr = AddAddr {
        addr_id,
        address,
        port,
    };
    meta.add_addr = Some(add_addr);
    rx.pending_add_addr.push(add_addr);
    Ok(())
}

fn parse_mp_fail(bytes: &[u8], length: usize, meta: &mut SegmentMeta) -> Result<(), OptionError> {
    if length != 8 {
        return Err(OptionError::BadLength {
            subtype: 6,
            length,
        });
    }
    let data_seq = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
    meta.mp_fail = Some(MpFail { data_seq });
    Ok(())
}

/// Walks a raw TCP options buffer looking for MPTCP suboptions (kind ==
/// [`super::MPTCP_OPTION_KIND`]) and feeds each one found to
/// [`parse_suboption`]. Unrelated option kinds (MSS, window scale,
/// timestamps, ...) are skipped; parsing those is an external
/// collaborator's job (§1).
pub fn scan_tcp_options(
    options: &[u8],
    negotiated_checksum: bool,
    meta: &mut SegmentMeta,
    rx: &mut RxOptionState,
) {
    let mut i = 0;
    while i < options.len() {
        match options[i] {
            0 => break,                // End of option list
            1 => i += 1,               // NOP
            kind => {
                if i + 1 >= options.len() {
                    break;
                }
                let len = options[i + 1] as usize;
                if len < 2 || i + len > options.len() {
                    break;
                }
                if kind == super::MPTCP_OPTION_KIND {
                    if let Err(e) =
                        parse_suboption(&options[i..i + len], negotiated_checksum, i, meta, rx)
                    {
                        tracing::warn!(error = %e, "ignoring malformed MPTCP suboption");
                    }
                }
                i += len;
            }
        }
    }
}
