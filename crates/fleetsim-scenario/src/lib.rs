//! fleetsim-scenario: cascading failure injection.
//!
//! Each scenario in the library moves through a small state machine,
//! advanced once per simulation tick:
//!
//! ```text
//!   Idle ──gen_bool(p)──▶ Triggered ──first step──▶ Stepping
//!    ▲                                                  │
//!    │                                             last step
//!    │                                                  ▼
//!    └──── alerts resolved ◀── settle window ◀──── Settling
//! ```
//!
//! Step delays are offsets on the simulation clock (`tick × interval`),
//! so step order follows tick order with no timers of its own.

pub mod engine;
pub mod error;
pub mod library;

pub use engine::{AdvanceReport, ScenarioEngine, ScenarioPhase};
pub use error::{ScenarioError, ScenarioResult};
pub use library::default_library;
