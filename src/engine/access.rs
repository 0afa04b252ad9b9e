//! Role-based authorization for engine operations.
//!
//! A capability registry mapping identities to granted capabilities. The
//! registry is owned by the engine and passed by handle into every check;
//! there is no global state.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::error::{EngineError, EngineResult};

/// Capabilities an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Swap adapters, sweep funds, manage roles.
    Admin,
    /// Drive execution on any active position on behalf of its owner.
    Keeper,
}

impl Capability {
    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Admin => "admin",
            Capability::Keeper => "keeper",
        }
    }
}

/// Identity → capability-set registry.
///
/// Role state persists for the engine's lifetime. Grants and revocations are
/// restricted to `Admin` holders; the bootstrap identity receives both
/// `Admin` and `Keeper`.
#[derive(Debug)]
pub struct AccessController {
    grants: HashMap<String, HashSet<Capability>>,
}

impl AccessController {
    /// Create a registry with `bootstrap` holding `Admin` and `Keeper`.
    pub fn new(bootstrap: &str) -> Self {
        let mut grants = HashMap::new();
        grants.insert(
            bootstrap.to_string(),
            HashSet::from([Capability::Admin, Capability::Keeper]),
        );
        info!(identity = %bootstrap, "Bootstrapped access controller");
        Self { grants }
    }

    /// Check whether `identity` holds `capability`.
    pub fn has_capability(&self, identity: &str, capability: Capability) -> bool {
        self.grants
            .get(identity)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Grant `capability` to `identity`. Admin-gated.
    pub fn grant(&mut self, identity: &str, capability: Capability, caller: &str) -> EngineResult<()> {
        self.require_admin(caller)?;
        self.grants
            .entry(identity.to_string())
            .or_default()
            .insert(capability);
        info!(identity = %identity, capability = capability.as_str(), granted_by = %caller, "Granted role");
        Ok(())
    }

    /// Revoke `capability` from `identity`. Admin-gated.
    pub fn revoke(
        &mut self,
        identity: &str,
        capability: Capability,
        caller: &str,
    ) -> EngineResult<()> {
        self.require_admin(caller)?;
        if let Some(caps) = self.grants.get_mut(identity) {
            caps.remove(&capability);
            if caps.is_empty() {
                self.grants.remove(identity);
            }
        }
        info!(identity = %identity, capability = capability.as_str(), revoked_by = %caller, "Revoked role");
        Ok(())
    }

    /// Fail with `Unauthorized` unless `caller` holds `Admin`.
    pub fn require_admin(&self, caller: &str) -> EngineResult<()> {
        if self.has_capability(caller, Capability::Admin) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(caller.to_string()))
        }
    }

    /// Fail with `Unauthorized` unless `caller` may drive execution against
    /// a position owned by `owner`: the owner themselves, an `Admin`, or a
    /// delegated `Keeper`.
    pub fn authorize_execution(&self, caller: &str, owner: &str) -> EngineResult<()> {
        if caller == owner
            || self.has_capability(caller, Capability::Admin)
            || self.has_capability(caller, Capability::Keeper)
        {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(caller.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_identity_holds_both_capabilities() {
        let access = AccessController::new("operator");
        assert!(access.has_capability("operator", Capability::Admin));
        assert!(access.has_capability("operator", Capability::Keeper));
        assert!(!access.has_capability("alice", Capability::Keeper));
    }

    #[test]
    fn only_admin_can_grant_and_revoke() {
        let mut access = AccessController::new("operator");

        assert!(matches!(
            access.grant("bob", Capability::Keeper, "alice"),
            Err(EngineError::Unauthorized(_))
        ));

        access.grant("bob", Capability::Keeper, "operator").unwrap();
        assert!(access.has_capability("bob", Capability::Keeper));

        access.revoke("bob", Capability::Keeper, "operator").unwrap();
        assert!(!access.has_capability("bob", Capability::Keeper));
    }

    #[test]
    fn granted_admin_can_manage_roles() {
        let mut access = AccessController::new("operator");
        access.grant("alice", Capability::Admin, "operator").unwrap();
        access.grant("carol", Capability::Keeper, "alice").unwrap();
        assert!(access.has_capability("carol", Capability::Keeper));
    }

    #[test]
    fn execution_authorization_covers_owner_admin_and_keeper() {
        let mut access = AccessController::new("operator");
        access.grant("keeper-1", Capability::Keeper, "operator").unwrap();

        assert!(access.authorize_execution("alice", "alice").is_ok());
        assert!(access.authorize_execution("operator", "alice").is_ok());
        assert!(access.authorize_execution("keeper-1", "alice").is_ok());
        assert!(matches!(
            access.authorize_execution("mallory", "alice"),
            Err(EngineError::Unauthorized(_))
        ));
    }
}
