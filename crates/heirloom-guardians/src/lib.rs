//! Heirloom Guardian Registry
//!
//! Directory of guardians: who is registered, who is verified, their
//! reputation, and how many wills each currently protects. The Will
//! Engine consults this registry when wills are created and released;
//! admins manage verification and reputation.

pub mod profile;
pub mod registry;

pub use profile::{GuardianLimits, GuardianProfile};
pub use registry::GuardianRegistry;

/// Reputation a guardian starts with at registration.
pub const REPUTATION_START: u32 = 100;

/// Reputation ceiling.
pub const REPUTATION_MAX: u32 = 1000;

/// Reputation awarded per successful release.
pub const REPUTATION_RELEASE_BONUS: u32 = 10;
