//! fleetsim-autoscale: operational pool autoscaling.
//!
//! Evaluated once per policy period over the operational pool aggregate.
//!
//! # Scaling rule
//!
//! ```text
//! overloaded = avg_cpu > out || avg_memory > out || critical > 0.2 * total
//! idle       = avg_cpu < in  && avg_memory < in  && critical == 0
//!
//! if overloaded && total < max:  ScaleOut(min(total + step, max))
//! elif idle && total > min:      ScaleIn(max(total - 1, min))
//! else:                          Maintain
//! ```
//!
//! Evaluation is skipped until strictly more than `cooldown` has passed
//! since the last executed action (automatic or manual). Scale-out draws
//! roles from web, api, worker and cache; scale-in removes the healthiest,
//! least loaded servers first.

pub mod scaler;

pub use scaler::{Autoscaler, OPTIMAL_ROLES, PoolAggregate, ScaleDecision};
