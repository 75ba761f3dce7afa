//! Stream monitoring: the per-tick state machine and the loop driving it.

pub mod reconciler;
pub mod schedule;

pub use reconciler::{ReconcilerState, StatusReconciler, TickOutcome};
pub use schedule::{next_delay, run};
