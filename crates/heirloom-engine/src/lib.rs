//! Heirloom Will Engine
//!
//! The coordinated state machine at the center of the system: a will is
//! created with guardians and beneficiaries, the owner proves liveness by
//! heartbeat, and release happens only after the liveness timer expires,
//! a k-of-n guardian quorum approves (or the owner asks), and a mandatory
//! timelock passes. Finalization dispatches asset distribution through
//! the vault.
//!
//! ```text
//!              [CREATED]
//!                 │  heartbeat resets the timer while not released
//!    timer expired│ and quorum met   │ or owner requests
//!                 ▼                  ▼
//!              [RELEASE_REQUESTED]   release_request_ts = now
//!                 │
//!                 │  wait RELEASE_TIMELOCK (7 days)
//!                 ▼
//!              [RELEASED]            terminal; assets dispatched
//! ```

pub mod dispatch;
pub mod engine;
pub mod will;

pub use dispatch::ReleaseDispatcher;
pub use engine::{CreateWill, WillEngine};
pub use will::{equal_shares, Will};

use heirloom_core::{Auth, Principal, Role};

/// The identity the engine itself uses for privileged calls into the
/// vault and the guardian registry. Hosts grant the `WillManager` role
/// to this reserved principal.
pub(crate) fn engine_auth() -> Auth {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(b"heirloom/engine\0");
    Auth::caller(Principal::new(bytes)).with_role(Role::WillManager)
}
