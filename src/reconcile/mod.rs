mod engine;
pub mod matcher;

pub use engine::{ReconcileOutcome, Reconciler};
