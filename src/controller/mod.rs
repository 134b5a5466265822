pub mod canary;

pub use canary::{error_policy, reconcile, Context, ReconcileError};
