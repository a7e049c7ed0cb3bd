//! A Multipath TCP (MPTCP) endpoint core: the meta-connection control
//! block that binds several parallel TCP subflows into a single
//! reliable byte stream, the option codec and data-sequence mapping
//! engine that keep each subflow's bytes addressable in that shared
//! space, the send-side scheduler and reinjection path, and the path
//! manager/join engine that discover and attach new subflows.
//!
//! # Organization
//! - [`options`] parses and emits the MPTCP TCP suboptions.
//! - [`dss`] is the data-sequence mapping engine (§4.2 in the design).
//! - [`reassembly`] is the meta-level receive/ofo queue.
//! - [`scheduler`] picks a subflow per outbound segment and drives
//!   reinjection.
//! - [`subflow`] models the slice of per-subflow state the meta layer
//!   reads or mutates; the ordinary single-flow TCP state machine itself
//!   is an external collaborator.
//! - [`mcb`] is the meta-connection control block tying the above
//!   together, plus its own lifecycle state machine.
//! - [`pathmanager`] and [`join`] implement address discovery/learning
//!   and the `MP_JOIN` handshake.
//! - [`worker`] defers MCB-affecting work out of interrupt-like call
//!   paths.

mod checksum;
pub use checksum::Checksum;

pub mod message;
pub use message::Message;

pub mod seq;

pub mod address;
pub use address::{AddrId, LocalAddr, RemoteAddr, Socket};

pub mod error;

pub mod config;
pub use config::Config;

pub mod options;

pub mod dss;

pub mod reassembly;
pub use reassembly::Reassembly;

pub mod subflow;
pub use subflow::Subflow;

pub mod scheduler;

pub mod token_table;
pub use token_table::{TokenAllocator, TokenTable};

pub mod mcb;
pub use mcb::Mcb;

pub mod pathmanager;
pub use pathmanager::PathManager;

pub mod join;
pub use join::JoinEngine;

pub mod worker;

use std::hash::BuildHasherDefault;

/// A `DashMap` keyed with `rustc_hash`'s `FxHasher`, matching
/// `elvis_core::FxDashMap`: the token table and join engine's tuple
/// table are both dominated by reads and keyed by small integers/
/// addresses, exactly the shape `FxHasher` is faster for than the
/// default SipHash.
pub type FxDashMap<K, V> = dashmap::DashMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
