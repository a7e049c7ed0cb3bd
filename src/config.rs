//! Host-wide configuration, modeling the sysctl surface of §6. Names are
//! preserved for operational continuity, as the spec requires; this is
//! the Rust-native equivalent of the sysctl table, constructed once and
//! shared (`Arc<Config>`) the way `elvis_core::protocols::tcp::Tcp` is
//! shared across sessions it owns.

/// The one scheduler this core ships, per §6's `mptcp_scheduler` table
/// ("one entry today: srtt-min").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    #[default]
    SrttMin,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `mptcp_enabled`: master enable bit.
    pub enabled: bool,
    /// `mptcp_mss`: default meta-MSS; subflows whose MSS is smaller are
    /// not candidates for scheduling.
    pub mss: u16,
    /// `mptcp_ndiffports`: if > 1, the path manager builds N ports on the
    /// master address instead of discovering multiple addresses (§4.7
    /// per-ports mode).
    pub ndiffports: u8,
    /// `mptcp_checksum`: require the DSS checksum (§4.1/§4.2).
    pub checksum_required: bool,
    /// `mptcp_scheduler`.
    pub scheduler: SchedulerKind,
    /// Bound on locally-discovered addresses (§4.7, "typically 12").
    pub max_local_addrs: usize,
    /// Bound on remote addresses learned via `ADD_ADDR` (§4.7, "the list
    /// is bounded"); taken from `MPTCP_MAX_ADDR` in the kernel source.
    pub max_remote_addrs: usize,
    /// Backpressure cap on the meta out-of-order queue (§4.3).
    pub ofo_queue_cap_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            mss: 1460,
            ndiffports: 1,
            checksum_required: false,
            scheduler: SchedulerKind::default(),
            max_local_addrs: 12,
            max_remote_addrs: 8,
            ofo_queue_cap_bytes: 1 << 20,
        }
    }
}
