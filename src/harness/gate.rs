use std::fmt;

use tracing::{debug, info, warn};

use crate::error::HarnessError;
use crate::session::Session;
use crate::workload::Workload;

use super::filter::EventFilter;
use super::reduce::{self, AggregateResult};

/// Measurement phase. Transitions are strictly forward; any fault aborts the
/// run and the caller re-runs the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WarmingUp,
    Measuring,
    Reduced,
    Gated,
}

impl Phase {
    /// Returns the canonical log label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WarmingUp => "warming_up",
            Self::Measuring => "measuring",
            Self::Reduced => "reduced",
            Self::Gated => "gated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regression gate over the reduced aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRule {
    /// Passes iff `per_unit` is strictly below the limit.
    MeanBelow(u64),
    /// Passes iff `events_per_unit` equals the expected count exactly.
    CountPerUnit(u64),
}

impl GateRule {
    /// Evaluates this rule against a reduced aggregate.
    pub fn evaluate(self, aggregate: &AggregateResult) -> Verdict {
        let (observed, passed) = match self {
            Self::MeanBelow(limit) => (aggregate.per_unit, aggregate.per_unit < limit),
            Self::CountPerUnit(expected) => (
                aggregate.events_per_unit,
                aggregate.events_per_unit == expected,
            ),
        };
        Verdict {
            rule: self,
            observed,
            passed,
        }
    }
}

impl fmt::Display for GateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanBelow(limit) => write!(f, "per-unit cost < {limit}"),
            Self::CountPerUnit(expected) => write!(f, "events per unit == {expected}"),
        }
    }
}

/// Result of evaluating one gate rule.
///
/// A failed gate is the intended positive-detection outcome of the harness,
/// reported as data rather than as an error.
#[derive(Debug, Clone, Copy)]
pub struct Verdict {
    pub rule: GateRule,
    pub observed: u64,
    pub passed: bool,
}

/// The reduced aggregate plus all gate verdicts for one measurement pass.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub aggregate: AggregateResult,
    pub verdicts: Vec<Verdict>,
}

impl Outcome {
    /// True if every gate passed. An empty gate list is a baseline run and
    /// always passes.
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }
}

/// Inclusive domain from which measured unit ids are drawn.
///
/// Randomizing the input id keeps cache-locality artifacts from skewing the
/// per-unit metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDomain {
    pub min: u64,
    pub max: u64,
}

impl UnitDomain {
    /// Draws one unit id uniformly from the domain.
    pub fn sample(&self) -> u64 {
        fastrand::u64(self.min..=self.max)
    }
}

/// Fixed parameters for one measurement pass.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementPlan {
    /// Warm-up units driven and discarded before measuring.
    pub warmup_units: u64,
    /// Measured units; the divisor for every per-unit value.
    pub measured_units: u64,
    /// Domain for unit ids in both phases.
    pub unit_domain: UnitDomain,
    /// Capture events during warm-up. Off by default: warm-up exists only to
    /// reach steady state, and capturing it grows the buffer for nothing.
    pub capture_warmup: bool,
}

const PROGRESS_INTERVAL: u64 = 1000;

/// Drives the warm-up/measure/reduce/gate protocol for one session.
pub struct Measurement {
    plan: MeasurementPlan,
    phase: Phase,
}

impl Measurement {
    /// Creates an idle measurement with the given plan.
    pub fn new(plan: MeasurementPlan) -> Self {
        Self {
            plan,
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the full protocol: warm up, reset, measure exactly N units,
    /// flush, filter, reduce, gate. One pass is definitive; callers needing
    /// statistical confidence re-run the whole session.
    pub async fn run<W: Workload>(
        &mut self,
        session: &Session,
        workload: &W,
        filter: &EventFilter,
        gates: &[GateRule],
    ) -> Result<Outcome, HarnessError> {
        self.phase = Phase::WarmingUp;
        if !self.plan.capture_warmup {
            session.pause_capture();
        }
        info!(units = self.plan.warmup_units, "warm-up started");

        for i in 1..=self.plan.warmup_units {
            let unit_id = self.plan.unit_domain.sample();
            workload.run_unit(unit_id).await?;
            if i % PROGRESS_INTERVAL == 0 {
                debug!(completed = i, phase = %self.phase, "progress");
            }
        }

        // Discard warm-up noise: drain in-flight events, clear the buffer,
        // and start the measured epoch with capture on.
        session.resume_capture();
        session.reset().await?;

        self.phase = Phase::Measuring;
        info!(units = self.plan.measured_units, "measurement started");

        for i in 1..=self.plan.measured_units {
            let unit_id = self.plan.unit_domain.sample();
            workload.run_unit(unit_id).await?;
            if i % PROGRESS_INTERVAL == 0 {
                debug!(completed = i, phase = %self.phase, "progress");
            }
        }

        session.flush().await?;
        self.phase = Phase::Reduced;

        let snapshot = session.snapshot();
        let aggregate = reduce::reduce(filter.iter(&snapshot), self.plan.measured_units);
        info!(
            buffered = snapshot.len(),
            matched = aggregate.event_count,
            sum = aggregate.sum,
            per_unit = aggregate.per_unit,
            events_per_unit = aggregate.events_per_unit,
            "measurement reduced",
        );

        self.phase = Phase::Gated;
        let verdicts: Vec<Verdict> = gates.iter().map(|g| g.evaluate(&aggregate)).collect();
        for verdict in &verdicts {
            if verdict.passed {
                debug!(rule = %verdict.rule, observed = verdict.observed, "gate passed");
            } else {
                warn!(rule = %verdict.rule, observed = verdict.observed, "regression detected");
            }
        }

        Ok(Outcome {
            aggregate,
            verdicts,
        })
    }
}
