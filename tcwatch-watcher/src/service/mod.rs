//! Service layer
//!
//! Services contain the reconciliation logic of the watcher. Each one takes
//! the current published state, queries the CI backend, and returns the next
//! state plus the events to dispatch. None of them publishes anything: the
//! scheduler decides when a pass is complete.

mod discovery;
mod reconcile;
mod topology;

pub use discovery::{DiscoveryOutcome, DiscoveryService, Scan};
pub use reconcile::{ReconcileOutcome, ReconcileService};
pub use topology::TopologyService;
