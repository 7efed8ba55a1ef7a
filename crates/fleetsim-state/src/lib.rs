//! fleetsim-state: in-memory fleet store.
//!
//! Owns every server entity and alert of both pools, the scaling-event
//! log and the run metadata. Other components never hold server values;
//! they request mutations through [`FleetStore`].
//!
//! # Invariants
//!
//! - ids are unique across the analysis and operational pools
//! - metrics stay inside their domains and `status` always matches them
//! - the analysis pool is populated once and never resized
//!
//! The store is not internally synchronized. The engine keeps it behind a
//! single `tokio::sync::Mutex` together with the scenario engine and the
//! autoscaler.

pub mod error;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::{FleetStore, MetricUpdate};
