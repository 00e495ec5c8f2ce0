//! Heirloom Core
//!
//! Shared primitives for the inheritance engine: principal identities,
//! role-based authorization, the error taxonomy, the append-only event
//! log, and the clock abstraction.
//!
//! Everything here is host-independent. A ledger, database, or consensus
//! layer embeds the engine crates and supplies principals, time, and
//! persistence at the boundary.

pub mod auth;
pub mod clock;
pub mod error;
pub mod events;
pub mod principal;

pub use auth::{Auth, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use events::{Event, EventLog, RecordedEvent};
pub use principal::Principal;

/// Maximum guardians per will. Bounded so the approval bitmap fits in a `u32`.
pub const MAX_GUARDIANS: usize = 20;

/// Maximum beneficiaries per will.
pub const MAX_BENEFICIARIES: usize = 50;

/// Minimum heartbeat timeout: 1 day, in seconds.
pub const MIN_HEARTBEAT_TIMEOUT: u64 = 86_400;

/// Maximum heartbeat timeout: 10 years, in seconds.
pub const MAX_HEARTBEAT_TIMEOUT: u64 = 315_360_000;

/// Delay between a release request and finalization: 7 days, in seconds.
pub const RELEASE_TIMELOCK: u64 = 604_800;

/// Beneficiary shares are basis points summing to exactly this.
pub const BPS_DENOMINATOR: u64 = 10_000;
