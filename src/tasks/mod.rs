//! Background tasks module
//!
//! Per-timer countdown tickers and the one-shot load-time reconciliation.

pub mod countdown;
pub mod reconcile;

// Re-export main functions
pub use countdown::countdown_task;
pub use reconcile::{ReconcileReport, ServerReconciler};
