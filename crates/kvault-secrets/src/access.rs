//! Create-or-update grants checked under the path lock.
//!
//! Whether a mutation creates a secret or changes an existing one is only
//! known once the path lock is held and the metadata is loaded. Callers that
//! enforce policy hand the engine an [`AccessCheck`] carrying the capabilities
//! they hold on the guarding policy path; the engine settles it against the
//! metadata it loaded before anything is written.

use kvault_auth::Capability;
use kvault_auth::CapabilitySet;
use tracing::warn;

use crate::error::Result;
use crate::error::SecretsError;

/// Capabilities held on one policy path, settled once existence is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    policy_path: String,
    capabilities: CapabilitySet,
    operation: String,
    update_creates: bool,
}

impl AccessCheck {
    /// `create` is needed for an absent secret, `update` for an existing one.
    pub fn new(policy_path: impl Into<String>, capabilities: CapabilitySet, operation: impl Into<String>) -> Self {
        Self {
            policy_path: policy_path.into(),
            capabilities,
            operation: operation.into(),
            update_creates: false,
        }
    }

    /// Also accept `update` for an absent secret.
    pub fn update_may_create(mut self) -> Self {
        self.update_creates = true;
        self
    }

    /// Settle the check for a secret that does or does not exist.
    pub fn authorize(&self, exists: bool) -> Result<()> {
        let (needed, allowed) = if exists {
            (Capability::Update, self.capabilities.contains(Capability::Update))
        } else {
            let allowed = self.capabilities.contains(Capability::Create)
                || (self.update_creates && self.capabilities.contains(Capability::Update));
            (Capability::Create, allowed)
        };
        if allowed {
            return Ok(());
        }

        warn!(
            policy_path = %self.policy_path,
            capability = %needed,
            operation = %self.operation,
            exists,
            "Permission denied"
        );
        Err(SecretsError::PermissionDenied {
            path: self.policy_path.clone(),
            capability: needed,
            operation: self.operation.clone(),
        })
    }
}

/// Settle every check in `checks`, stopping at the first denial.
pub(crate) fn authorize_all(checks: &[AccessCheck], exists: bool) -> Result<()> {
    checks.iter().try_for_each(|check| check.authorize(exists))
}
