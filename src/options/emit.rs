//! Builds outbound MPTCP suboption bytes from a structured descriptor
//! (§4.1: "Emits options on outbound segments from a structured option
//! descriptor"), the write-side counterpart of `codec.rs`.

use super::{AddAddr, DssMapping, MpJoinStage, MPTCP_OPTION_KIND};
use std::net::IpAddr;

fn sub_byte(sub: u8, low_nibble: u8) -> u8 {
    (sub << 4) | (low_nibble & 0x0f)
}

pub fn emit_mp_capable_syn(checksum_requested: bool, sender_key: u64) -> Vec<u8> {
    let mut out = vec![MPTCP_OPTION_KIND, 12, sub_byte(0, 0)];
    out.push(if checksum_requested { 0x80 } else { 0 });
    out.extend_from_slice(&sender_key.to_be_bytes());
    out
}

pub fn emit_mp_capable_ack(checksum_requested: bool, sender_key: u64, receiver_key: u64) -> Vec<u8> {
    let mut out = vec![MPTCP_OPTION_KIND, 20, sub_byte(0, 0)];
    out.push(if checksum_requested { 0x80 } else { 0 });
    out.extend_from_slice(&sender_key.to_be_bytes());
    out.extend_from_slice(&receiver_key.to_be_bytes());
    out
}

pub fn emit_mp_join(backup: bool, addr_id: u8, stage: MpJoinStage) -> Vec<u8> {
    let flags = sub_byte(1, backup as u8);
    match stage {
        MpJoinStage::Syn {
            receiver_token,
            sender_nonce,
        } => {
            let mut out = vec![MPTCP_OPTION_KIND, 12, flags, addr_id];
            out.extend_from_slice(&receiver_token.to_be_bytes());
            out.extend_from_slice(&sender_nonce.to_be_bytes());
            out
        }
        MpJoinStage::SynAck {
            sender_hmac,
            sender_nonce,
        } => {
            let mut out = vec![MPTCP_OPTION_KIND, 16, flags, addr_id];
            out.extend_from_slice(&sender_hmac);
            out.extend_from_slice(&sender_nonce.to_be_bytes());
            out
        }
        MpJoinStage::Ack { sender_hmac } => {
            let mut out = vec![MPTCP_OPTION_KIND, 24, flags, 0];
            out.extend_from_slice(&sender_hmac);
            out
        }
    }
}

/// Descriptor for an outbound `DSS` option (§4.1/§6).
#[derive(Debug, Clone, Copy, Default)]
pub struct DssOut {
    pub data_ack: Option<u64>,
    pub mapping: Option<DssMapping>,
    pub dfin: bool,
}

pub fn emit_dss(dss: DssOut, negotiated_checksum: bool) -> Vec<u8> {
    let mut flags = 0u8;
    let mut payload = Vec::new();

    if let Some(ack) = dss.data_ack {
        if ack > u32::MAX as u64 {
            flags |= 0b0000_0010; // big A
            payload.extend_from_slice(&ack.to_be_bytes());
        } else {
            flags |= 0b0000_0001; // A
            payload.extend_from_slice(&(ack as u32).to_be_bytes());
        }
    }
    if let Some(m) = dss.mapping {
        flags |= 0b0000_1000 | 0b0000_0100; // m, M
        payload.extend_from_slice(&(m.data_seq as u32).to_be_bytes());
        payload.extend_from_slice(&m.sub_seq.to_be_bytes());
        payload.extend_from_slice(&m.data_len.to_be_bytes());
        if negotiated_checksum {
            payload.extend_from_slice(&m.checksum.unwrap_or_default().to_be_bytes());
        }
    }
    if dss.dfin {
        flags |= 0b0001_0000;
    }

    let length = 4 + payload.len();
    let mut out = vec![MPTCP_OPTION_KIND, length as u8, sub_byte(2, 0), flags];
    out.extend(payload);
    out
}

pub fn emit_add_addr(entry: AddAddr) -> Vec<u8> {
    let (ipver, addr_bytes): (u8, Vec<u8>) = match entry.address {
        IpAddr::V4(v4) => (4, v4.octets().to_vec()),
        IpAddr::V6(v6) => (6, v6.octets().to_vec()),
    };
    let mut out = vec![
        MPTCP_OPTION_KIND,
        0, // patched below
        sub_byte(3, ipver),
        entry.addr_id,
    ];
    out.extend(addr_bytes);
    if let Some(port) = entry.port {
        out.extend_from_slice(&port.to_be_bytes());
    }
    out[1] = out.len() as u8;
    out
}

pub fn emit_mp_fail(data_seq: u32) -> Vec<u8> {
    let mut out = vec![MPTCP_OPTION_KIND, 8, sub_byte(6, 0), 0];
    out.extend_from_slice(&data_seq.to_be_bytes());
    out
}
