//! The guardian registry service.
//!
//! Interior mutability so the Will Engine and the host can share one
//! registry behind an `Arc`. Every mutation runs atomically under the
//! registry lock; reads observe a consistent snapshot.

use crate::profile::{GuardianLimits, GuardianProfile};
use crate::{REPUTATION_MAX, REPUTATION_RELEASE_BONUS};
use heirloom_core::{Auth, Clock, Error, Event, EventLog, Principal, Role};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct GuardianRegistry {
    limits: GuardianLimits,
    profiles: Mutex<HashMap<Principal, GuardianProfile>>,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
}

impl GuardianRegistry {
    pub fn new(limits: GuardianLimits, events: Arc<EventLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            profiles: Mutex::new(HashMap::new()),
            events,
            clock,
        }
    }

    pub fn limits(&self) -> &GuardianLimits {
        &self.limits
    }

    /// Register the calling principal as a guardian.
    ///
    /// Rejects re-registration; a guardian's history must not be
    /// resettable by registering again.
    pub fn register(
        &self,
        auth: &Auth,
        metadata_uri: String,
        public_key_hash: [u8; 32],
        commitment_root: [u8; 32],
    ) -> Result<(), Error> {
        let guardian = auth.principal();
        if guardian.is_null() {
            return Err(Error::invalid("null principal cannot register"));
        }

        let mut profiles = self.lock();
        if profiles.contains_key(&guardian) {
            return Err(Error::invalid("guardian already registered"));
        }

        let now = self.clock.now_secs();
        profiles.insert(
            guardian,
            GuardianProfile::new(metadata_uri, public_key_hash, commitment_root, now),
        );
        drop(profiles);

        log::info!("guardian registered: {guardian}");
        self.events.append(now, Event::GuardianRegistered { guardian });
        Ok(())
    }

    /// Admin: set or clear a guardian's verified flag.
    pub fn verify(&self, auth: &Auth, guardian: Principal, flag: bool) -> Result<(), Error> {
        auth.require(Role::Admin)?;

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        profile.verified = flag;
        drop(profiles);

        log::info!("guardian {guardian} verified={flag}");
        self.events.append(
            self.clock.now_secs(),
            Event::GuardianVerified {
                guardian,
                verified: flag,
            },
        );
        Ok(())
    }

    /// Deactivate a guardian: the guardian themselves, or an admin.
    pub fn deactivate(&self, auth: &Auth, guardian: Principal) -> Result<(), Error> {
        if auth.principal() != guardian && !auth.has_role(Role::Admin) {
            return Err(Error::Unauthorized {
                required: Role::Admin,
            });
        }

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        profile.active = false;
        drop(profiles);

        log::info!("guardian deactivated: {guardian}");
        self.events
            .append(self.clock.now_secs(), Event::GuardianDeactivated { guardian });
        Ok(())
    }

    /// A guardian publishes a share-possession commitment.
    pub fn add_commitment(&self, auth: &Auth, commitment: [u8; 32]) -> Result<(), Error> {
        let guardian = auth.principal();

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        if !profile.active {
            return Err(Error::invalid("guardian is deactivated"));
        }
        profile.commitments.insert(commitment);
        drop(profiles);

        self.events.append(
            self.clock.now_secs(),
            Event::CommitmentAdded {
                guardian,
                commitment,
            },
        );
        Ok(())
    }

    /// Will Engine: reserve a slot on this guardian for a new will.
    pub fn attach_to_will(&self, auth: &Auth, guardian: Principal) -> Result<(), Error> {
        auth.require(Role::WillManager)?;

        let mut profiles = self.lock();
        let limits = &self.limits;
        let profile = profiles
            .get_mut(&guardian)
            .ok_or_else(|| Error::invalid(format!("guardian not registered: {guardian}")))?;

        if !profile.active {
            return Err(Error::invalid(format!("guardian {guardian} is deactivated")));
        }
        if !profile.verified {
            return Err(Error::invalid(format!("guardian {guardian} is not verified")));
        }
        if profile.reputation < limits.min_reputation {
            return Err(Error::invalid(format!(
                "guardian {guardian} reputation {} below minimum {}",
                profile.reputation, limits.min_reputation
            )));
        }
        if profile.total_wills >= limits.max_wills_per_guardian {
            return Err(Error::invalid(format!(
                "guardian {guardian} already protects {} wills",
                profile.total_wills
            )));
        }

        profile.total_wills += 1;
        Ok(())
    }

    /// Will Engine: release a slot. Saturates at zero.
    pub fn detach_from_will(&self, auth: &Auth, guardian: Principal) -> Result<(), Error> {
        auth.require(Role::WillManager)?;

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        profile.total_wills = profile.total_wills.saturating_sub(1);
        Ok(())
    }

    /// Will Engine: credit a guardian for a finalized release.
    pub fn record_successful_release(&self, auth: &Auth, guardian: Principal) -> Result<(), Error> {
        auth.require(Role::WillManager)?;

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        profile.successful_releases += 1;
        profile.reputation = (profile.reputation + REPUTATION_RELEASE_BONUS).min(REPUTATION_MAX);
        let reputation = profile.reputation;
        drop(profiles);

        self.events.append(
            self.clock.now_secs(),
            Event::ReputationUpdated {
                guardian,
                reputation,
            },
        );
        Ok(())
    }

    /// Admin: clip or restore a guardian's reputation.
    pub fn adjust_reputation(
        &self,
        auth: &Auth,
        guardian: Principal,
        new_value: u32,
    ) -> Result<(), Error> {
        auth.require(Role::Admin)?;
        if new_value > REPUTATION_MAX {
            return Err(Error::invalid(format!(
                "reputation {new_value} exceeds maximum {REPUTATION_MAX}"
            )));
        }

        let mut profiles = self.lock();
        let profile = Self::get_mut(&mut profiles, &guardian)?;
        profile.reputation = new_value;
        drop(profiles);

        log::info!("guardian {guardian} reputation set to {new_value}");
        self.events.append(
            self.clock.now_secs(),
            Event::ReputationUpdated {
                guardian,
                reputation: new_value,
            },
        );
        Ok(())
    }

    /// Guardians currently able to take on a new will with at least
    /// `min_rep` reputation. Read-only snapshot; no particular order.
    pub fn eligible_guardians(&self, min_rep: u32) -> Vec<Principal> {
        let profiles = self.lock();
        profiles
            .iter()
            .filter(|(_, p)| p.eligible(min_rep, self.limits.max_wills_per_guardian))
            .map(|(&principal, _)| principal)
            .collect()
    }

    /// Snapshot of one profile.
    pub fn profile(&self, guardian: &Principal) -> Option<GuardianProfile> {
        self.lock().get(guardian).cloned()
    }

    pub fn is_registered(&self, guardian: &Principal) -> bool {
        self.lock().contains_key(guardian)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Principal, GuardianProfile>> {
        self.profiles.lock().expect("guardian registry poisoned")
    }

    fn get_mut<'a>(
        profiles: &'a mut HashMap<Principal, GuardianProfile>,
        guardian: &Principal,
    ) -> Result<&'a mut GuardianProfile, Error> {
        profiles
            .get_mut(guardian)
            .ok_or_else(|| Error::invalid(format!("guardian not registered: {guardian}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heirloom_core::ManualClock;

    fn registry() -> GuardianRegistry {
        GuardianRegistry::new(
            GuardianLimits::default(),
            Arc::new(EventLog::new()),
            Arc::new(ManualClock::new(1_000)),
        )
    }

    fn admin() -> Auth {
        Auth::caller(Principal::from_label(99)).with_role(Role::Admin)
    }

    fn manager() -> Auth {
        Auth::caller(Principal::from_label(98)).with_role(Role::WillManager)
    }

    fn registered(reg: &GuardianRegistry, label: u8) -> Principal {
        let p = Principal::from_label(label);
        reg.register(&Auth::caller(p), "uri".into(), [0x11; 32], [0x22; 32])
            .unwrap();
        p
    }

    #[test]
    fn test_register_and_reject_duplicate() {
        let reg = registry();
        let g = registered(&reg, 1);
        assert!(reg.is_registered(&g));

        let again = reg.register(&Auth::caller(g), "uri2".into(), [0; 32], [0; 32]);
        assert!(matches!(again, Err(Error::InvalidParameters(_))));
    }

    #[test]
    fn test_null_principal_rejected() {
        let reg = registry();
        let result = reg.register(&Auth::caller(Principal::NULL), "uri".into(), [0; 32], [0; 32]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_requires_admin() {
        let reg = registry();
        let g = registered(&reg, 1);

        let plain = Auth::caller(Principal::from_label(2));
        assert!(matches!(
            reg.verify(&plain, g, true),
            Err(Error::Unauthorized { .. })
        ));

        reg.verify(&admin(), g, true).unwrap();
        assert!(reg.profile(&g).unwrap().verified);
    }

    #[test]
    fn test_deactivate_self_or_admin() {
        let reg = registry();
        let g = registered(&reg, 1);

        // A stranger cannot deactivate
        let stranger = Auth::caller(Principal::from_label(2));
        assert!(reg.deactivate(&stranger, g).is_err());

        // The guardian can
        reg.deactivate(&Auth::caller(g), g).unwrap();
        assert!(!reg.profile(&g).unwrap().active);
    }

    #[test]
    fn test_commitment_requires_active() {
        let reg = registry();
        let g = registered(&reg, 1);

        reg.add_commitment(&Auth::caller(g), [0xAB; 32]).unwrap();
        assert_eq!(reg.profile(&g).unwrap().commitments.len(), 1);

        reg.deactivate(&Auth::caller(g), g).unwrap();
        assert!(reg.add_commitment(&Auth::caller(g), [0xCD; 32]).is_err());
    }

    #[test]
    fn test_attach_gates() {
        let reg = registry();
        let g = registered(&reg, 1);

        // Unverified
        assert!(reg.attach_to_will(&manager(), g).is_err());

        reg.verify(&admin(), g, true).unwrap();
        reg.attach_to_will(&manager(), g).unwrap();
        assert_eq!(reg.profile(&g).unwrap().total_wills, 1);

        // Reputation below minimum
        reg.adjust_reputation(&admin(), g, 10).unwrap();
        assert!(reg.attach_to_will(&manager(), g).is_err());
    }

    #[test]
    fn test_attach_respects_quota() {
        let reg = GuardianRegistry::new(
            GuardianLimits {
                min_reputation: 0,
                max_wills_per_guardian: 2,
            },
            Arc::new(EventLog::new()),
            Arc::new(ManualClock::new(0)),
        );
        let g = registered(&reg, 1);
        reg.verify(&admin(), g, true).unwrap();

        reg.attach_to_will(&manager(), g).unwrap();
        reg.attach_to_will(&manager(), g).unwrap();
        assert!(reg.attach_to_will(&manager(), g).is_err());
    }

    #[test]
    fn test_detach_saturates_at_zero() {
        let reg = registry();
        let g = registered(&reg, 1);

        reg.detach_from_will(&manager(), g).unwrap();
        assert_eq!(reg.profile(&g).unwrap().total_wills, 0);
    }

    #[test]
    fn test_successful_release_bumps_reputation() {
        let reg = registry();
        let g = registered(&reg, 1);

        reg.record_successful_release(&manager(), g).unwrap();
        let p = reg.profile(&g).unwrap();
        assert_eq!(p.successful_releases, 1);
        assert_eq!(p.reputation, 110);
    }

    #[test]
    fn test_reputation_caps_at_max() {
        let reg = registry();
        let g = registered(&reg, 1);
        reg.adjust_reputation(&admin(), g, 995).unwrap();

        reg.record_successful_release(&manager(), g).unwrap();
        assert_eq!(reg.profile(&g).unwrap().reputation, REPUTATION_MAX);

        assert!(reg.adjust_reputation(&admin(), g, 1001).is_err());
    }

    #[test]
    fn test_eligible_guardians_scan() {
        let reg = registry();
        let a = registered(&reg, 1);
        let b = registered(&reg, 2);
        let _c = registered(&reg, 3); // never verified

        reg.verify(&admin(), a, true).unwrap();
        reg.verify(&admin(), b, true).unwrap();
        reg.adjust_reputation(&admin(), b, 40).unwrap();

        let eligible = reg.eligible_guardians(50);
        assert_eq!(eligible, vec![a]);

        // Lowering the bar admits b again
        let mut eligible = reg.eligible_guardians(0);
        eligible.sort();
        assert_eq!(eligible.len(), 2);
    }

    #[test]
    fn test_events_are_appended() {
        let events = Arc::new(EventLog::new());
        let reg = GuardianRegistry::new(
            GuardianLimits::default(),
            events.clone(),
            Arc::new(ManualClock::new(7)),
        );
        let g = registered(&reg, 1);
        reg.verify(&admin(), g, true).unwrap();

        let tail = events.tail(0);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event, Event::GuardianRegistered { guardian: g });
        assert_eq!(
            tail[1].event,
            Event::GuardianVerified {
                guardian: g,
                verified: true
            }
        );
    }
}
