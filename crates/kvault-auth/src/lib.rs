//! Policy capability evaluation for kvault.
//!
//! A policy binds path patterns to capabilities. Given the policies attached to
//! a caller and a target path, the evaluator returns the set of capabilities
//! the caller holds on that path:
//!
//! ```rust,ignore
//! use kvault_auth::{Capability, Policy, PolicyDocument, PolicySet, RuleDocument};
//!
//! let policy = Policy::try_from(PolicyDocument {
//!     name: "app".into(),
//!     rules: vec![RuleDocument::new("secret/data/app/*", &["read", "update"])],
//! })?;
//! let set = PolicySet::from(policy);
//! assert!(set.capabilities("secret/data/app/db").contains(Capability::Read));
//! ```
//!
//! Every path is evaluated on its own. A grant on `secret/data/x` says nothing
//! about `secret/metadata/x`.

pub mod capability;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod pattern;
pub mod policy;

pub use capability::Capability;
pub use capability::CapabilitySet;
pub use error::AuthError;
pub use error::Result;
pub use evaluator::PolicySet;
pub use evaluator::capabilities;
pub use pattern::PathPattern;
pub use pattern::Specificity;
pub use policy::PathRule;
pub use policy::Policy;
pub use policy::PolicyDocument;
pub use policy::RuleDocument;
