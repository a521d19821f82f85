// ── Reconciled alert store ──
//
// Single-writer alert view with push-based change notification.

mod reconciler;

pub use reconciler::{AlertReconciler, AlertView, Ingest, IngestSummary};
