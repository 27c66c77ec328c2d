//! The aggregation engine: predicate filtering over a buffer snapshot,
//! per-kind cost extraction, per-unit reduction, and the warm-up/measure
//! regression gate.

pub mod extract;
pub mod filter;
pub mod gate;
pub mod reduce;

pub use filter::{allocation_events, socket_events_for_port, EventFilter, Predicate};
pub use gate::{GateRule, Measurement, MeasurementPlan, Outcome, Phase, UnitDomain, Verdict};
pub use reduce::AggregateResult;
