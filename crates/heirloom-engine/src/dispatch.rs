//! The release dispatcher.
//!
//! A thin adapter between a finalized will and the escrow layer: tell
//! the vault to distribute, credit every approving guardian. Dispatcher
//! failure never unwinds the will's `released` flag — the will is
//! released at the engine boundary, and asset distribution is retried
//! out of band.

use crate::engine_auth;
use heirloom_core::{Error, Principal};
use heirloom_guardians::GuardianRegistry;
use heirloom_vault::AssetVault;
use std::sync::Arc;

pub struct ReleaseDispatcher {
    vault: Arc<AssetVault>,
    guardians: Option<Arc<GuardianRegistry>>,
}

impl ReleaseDispatcher {
    pub fn new(vault: Arc<AssetVault>) -> Self {
        Self {
            vault,
            guardians: None,
        }
    }

    /// Also credit approving guardians in this registry on dispatch.
    pub fn with_guardian_registry(mut self, guardians: Arc<GuardianRegistry>) -> Self {
        self.guardians = Some(guardians);
        self
    }

    /// Distribute a finalized will's assets and credit its approvers.
    pub fn dispatch(
        &self,
        will_id: u64,
        beneficiaries: &[Principal],
        shares_bp: &[u16],
        approvers: &[Principal],
    ) -> Result<(), Error> {
        let auth = engine_auth();
        let report = self
            .vault
            .release_assets(&auth, will_id, beneficiaries, shares_bp);

        if let Some(guardians) = &self.guardians {
            for &approver in approvers {
                if let Err(e) = guardians.record_successful_release(&auth, approver) {
                    // Credit is best-effort; an unregistered approver is
                    // the registry's business, not a release blocker
                    log::warn!("could not credit guardian {approver}: {e}");
                }
            }
        }

        report.map(|_| ())
    }
}
