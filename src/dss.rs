//! The data-sequence mapping (DSS) engine (§4.2): translates between a
//! subflow's byte stream and the shared data-sequence number (DSN)
//! space, including infinite-mapping fallback.

use crate::error::MappingError;
use crate::options::DssMapping;
use crate::seq::mod_leq;

/// The DSS window currently active on a subflow: `map_subseq ≤ subseq <
/// map_subseq + map_data_len (+1 if the window's segment carries a FIN)`
/// maps onto `[map_data_seq, map_data_seq + map_data_len)` in DSN space
/// (§3's "Mapping" attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mapping {
    pub map_data_seq: u64,
    pub map_data_len: u32,
    pub map_subseq: u32,
}

/// Tracks whether a subflow has switched to sending/interpreting an
/// infinite mapping (§4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteMapping {
    pub active: bool,
    /// The subflow sequence number at which the cutover happened.
    pub cutoff_subseq: u32,
    /// The DSN the cutover subseq corresponds to.
    pub cutoff_dsn: u64,
}

/// A segment's position in DSN space, derived by [`derive_data_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRange {
    pub data_seq: u64,
    pub end_data_seq: u64,
}

/// Where a [`DataRange`] falls relative to the meta receive-next
/// pointer (§4.2's three-way result, extended with the duplicate case
/// §4.3's `enqueue` needs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaClass {
    /// Wholly at-or-before `rcv_nxt`: every byte has already been
    /// delivered.
    Duplicate,
    /// Contains `rcv_nxt`: some bytes are new and contiguous.
    InMetaOrder,
    /// Wholly after `rcv_nxt`: a gap exists before this segment.
    Gap,
}

pub fn classify(range: DataRange, rcv_nxt: u64) -> MetaClass {
    if range.end_data_seq <= rcv_nxt {
        MetaClass::Duplicate
    } else if range.data_seq <= rcv_nxt {
        MetaClass::InMetaOrder
    } else {
        MetaClass::Gap
    }
}

/// Implements the §4.2 policy for one segment on one subflow.
///
/// `carried` is the mapping freshly parsed from this segment's own
/// `DSS.M`, if any — when present it replaces `mapping` before the
/// coverage check. `pure_subflow_fin` is true when the segment is a bare
/// subflow FIN with no data-FIN riding along (§4.2: "the meta layer
/// ignores it"), in which case `Ok(None)` is returned and `mapping` is
/// left untouched. `fin_dsn`/`dfin_bit` implement the `end_data_seq += 1`
/// rule for a segment that completes a previously-seen DFIN.
#[allow(clippy::too_many_arguments)]
pub fn derive_data_range(
    mapping: &mut Mapping,
    infinite: &InfiniteMapping,
    carried: Option<DssMapping>,
    seq: u32,
    end_seq: u32,
    has_fin: bool,
    pure_subflow_fin: bool,
    fin_dsn: Option<u64>,
    dfin_bit: bool,
) -> Result<Option<DataRange>, MappingError> {
    if pure_subflow_fin {
        return Ok(None);
    }

    if infinite.active {
        let offset = seq.wrapping_sub(infinite.cutoff_subseq) as u64;
        let data_seq = infinite.cutoff_dsn + offset;
        let len = end_seq.wrapping_sub(seq) as u64;
        let mut end_data_seq = data_seq + len;
        if dfin_bit {
            if let Some(fin_dsn) = fin_dsn {
                if fin_dsn == end_data_seq {
                    end_data_seq += 1;
                }
            }
        }
        return Ok(Some(DataRange {
            data_seq,
            end_data_seq,
        }));
    }

    if let Some(carried) = carried {
        *mapping = Mapping {
            map_data_seq: carried.data_seq,
            map_data_len: carried.data_len as u32,
            map_subseq: carried.sub_seq,
        };
    }

    let window_end = mapping
        .map_subseq
        .wrapping_add(mapping.map_data_len)
        .wrapping_add(has_fin as u32);
    let covered = mod_leq(mapping.map_subseq, seq) && mod_leq(end_seq, window_end);
    if !covered {
        return Err(MappingError::OutOfWindow {
            seq,
            end_seq,
            map_subseq: mapping.map_subseq,
            map_end: window_end,
        });
    }

    let data_seq = mapping.map_data_seq + seq.wrapping_sub(mapping.map_subseq) as u64;
    let len = end_seq.wrapping_sub(seq) as u64;
    let mut end_data_seq = data_seq + len;

    if dfin_bit {
        if let Some(fin_dsn) = fin_dsn {
            if fin_dsn == end_data_seq {
                end_data_seq += 1;
            }
        }
    }

    Ok(Some(DataRange {
        data_seq,
        end_data_seq,
    }))
}

/// Whether a freshly observed mapping fault should push the connection
/// into infinite-mapping mode: true when this subflow is the only one
/// left (§4.2, §4.6 "Mapping fault" row).
pub fn should_go_infinite(live_subflow_count: usize) -> bool {
    live_subflow_count <= 1
}

/// Starts infinite-mapping mode, anchoring the cutover at the given
/// subflow sequence number / DSN pair.
pub fn enter_infinite_mapping(infinite: &mut InfiniteMapping, cutoff_subseq: u32, cutoff_dsn: u64) {
    infinite.active = true;
    infinite.cutoff_subseq = cutoff_subseq;
    infinite.cutoff_dsn = cutoff_dsn;
}

/// Sentinel `data_len` carried in outbound DSS mappings once this side
/// has switched to infinite mapping (§4.2).
pub const INFINITE_MAPPING_LEN: u16 = 0xFFFF;

/// Verifies a DSS checksum for a segment whose DSS option carried one
/// (§4.1 "DSS CRC check"): payload bytes plus the DSS sequence fields,
/// folded with the same ones-complement checksum as the rest of the
/// stack.
pub fn verify_dss_checksum(
    payload: &[u8],
    mapping: &DssMapping,
    expected: u16,
) -> Result<(), MappingError> {
    let mut checksum = crate::checksum::Checksum::new();
    checksum.add_bytes(payload);
    checksum.add_u32((mapping.data_seq as u32).to_be_bytes());
    checksum.add_u32(mapping.sub_seq.to_be_bytes());
    checksum.add_u16(mapping.data_len);
    let computed = checksum.as_u16();
    if computed == expected {
        Ok(())
    } else {
        Err(MappingError::ChecksumMismatch { expected, computed })
    }
}
