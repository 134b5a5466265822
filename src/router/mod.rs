//! HTTPProxy routing reconciliation
//!
//! Translates a Canary description into a Contour HTTPProxy spec and keeps
//! the stored resource in sync without clobbering the weight split the
//! rollout loop is driving.

pub mod conditions;
pub mod contour;
pub mod spec;
pub mod store;

// Re-export everything so external API is unchanged
pub use conditions::*;
pub use contour::*;
pub use spec::*;
pub use store::*;
