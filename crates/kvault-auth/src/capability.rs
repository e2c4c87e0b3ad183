//! Capability definitions for authorization.
//!
//! A capability names one kind of operation a policy may grant on a path.
//! Capabilities are combined into a [`CapabilitySet`], which is what the
//! evaluator returns for a given path.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AuthError;

/// What operations a policy holder can perform on a path.
///
/// # Tiger Style
///
/// - Explicit variants for each operation type
/// - No implied capabilities: `update` does not grant `create`, `read` does not grant `list`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Write to a path that does not exist yet.
    Create,
    /// Read the value stored at a path.
    Read,
    /// Write to a path that already exists.
    Update,
    /// Delete the value stored at a path.
    Delete,
    /// List the children of a path prefix.
    List,
}

impl Capability {
    /// Every capability, in canonical order.
    pub const ALL: [Capability; 5] =
        [Capability::Create, Capability::Read, Capability::Update, Capability::Delete, Capability::List];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::Read => "read",
            Capability::Update => "update",
            Capability::Delete => "delete",
            Capability::List => "list",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Capability::Create => 1 << 0,
            Capability::Read => 1 << 1,
            Capability::Update => 1 << 2,
            Capability::Delete => 1 << 3,
            Capability::List => 1 << 4,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(Capability::Create),
            "read" => Ok(Capability::Read),
            "update" => Ok(Capability::Update),
            "delete" => Ok(Capability::Delete),
            "list" => Ok(Capability::List),
            _ => Err(AuthError::UnknownCapability { name: s.to_string() }),
        }
    }
}

/// A set of capabilities granted on one path.
///
/// The empty set is implicit deny.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set (implicit deny).
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set holding every capability.
    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Returns true if no capability is granted.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if `capability` is granted.
    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Returns true if any of `capabilities` is granted.
    pub fn contains_any(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|c| self.contains(*c))
    }

    /// Grant a capability.
    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    /// Revoke a capability.
    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    /// Union of two sets.
    #[must_use]
    pub fn union(self, other: CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | other.0)
    }

    /// Number of granted capabilities.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate granted capabilities in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(capabilities: [Capability; N]) -> Self {
        capabilities.into_iter().collect()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
