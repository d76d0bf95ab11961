//! Simulated annealing and its cooling schedules.

use std::time::{Duration, Instant};

use rand::Rng;

use localforge_core::{Result, SearchError, State};
use localforge_config::{ParameterKind, ParameterSet, ParameterSpec, Parametrized};

use crate::explorer::{accept_all, EvaluatedMove, NeighborhoodExplorer, Selection};

use super::{RunContext, RunnerParams, SearchPolicy};

/// Number of random moves probed to calibrate the start temperature when
/// none is configured.
const TEMPERATURE_PROBE_SAMPLES: u32 = 100;

/// The termination/cooling regime of a simulated annealing run.
#[derive(Debug, Clone)]
pub enum SaSchedule {
    /// Cool on counter thresholds; stop when the temperature falls to the
    /// minimum.
    MinTemperature { min_temperature: f64 },
    /// Derive the per-temperature sample budget from the runner's
    /// evaluation budget; the evaluation budget alone governs
    /// termination.
    EvaluationBudget {
        temperature_range: Option<f64>,
        expected_min_temperature: Option<f64>,
        neighbors_accepted_ratio: Option<f64>,
    },
    /// Same derivation, but each temperature also owns a slice of the
    /// allowed running time; the run stops when the time is up.
    TimeBudget {
        allowed_running_time: Duration,
        temperature_range: Option<f64>,
        expected_min_temperature: Option<f64>,
        neighbors_accepted_ratio: Option<f64>,
    },
    /// Like [`SaSchedule::MinTemperature`], but restart the temperature
    /// at a fraction of the start value for a bounded number of rounds.
    Reheating {
        min_temperature: f64,
        restart_temperature_ratio: f64,
        max_rounds: u32,
    },
}

/// Simulated annealing policy.
///
/// Each iteration draws one random move; improving and sideways moves are
/// always accepted, worsening ones with probability
/// `exp(-delta / temperature)`. Counters of sampled and accepted
/// neighbors drive geometric cooling; the [`SaSchedule`] decides when
/// cooling happens and when the run stops.
///
/// A `start_temperature` of zero asks for calibration: the policy probes
/// random moves from the initial state and starts at the largest delta
/// cost observed.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    start_temperature: f64,
    cooling_rate: f64,
    max_neighbors_sampled: u32,
    max_neighbors_accepted: u32,
    schedule: SaSchedule,

    temperature: f64,
    resolved_start: f64,
    neighbors_sampled: u32,
    neighbors_accepted: u32,
    temperatures_count: u32,
    rounds: u32,
    run_start: Option<Instant>,
    temperature_start: Option<Instant>,
    window: Option<Duration>,
}

impl SimulatedAnnealing {
    fn with_schedule(
        start_temperature: f64,
        cooling_rate: f64,
        max_neighbors_sampled: u32,
        max_neighbors_accepted: u32,
        schedule: SaSchedule,
    ) -> Self {
        SimulatedAnnealing {
            start_temperature,
            cooling_rate,
            max_neighbors_sampled,
            max_neighbors_accepted,
            schedule,
            temperature: 0.0,
            resolved_start: 0.0,
            neighbors_sampled: 0,
            neighbors_accepted: 0,
            temperatures_count: 0,
            rounds: 0,
            run_start: None,
            temperature_start: None,
            window: None,
        }
    }

    /// Classic variant: stop at a minimum temperature.
    pub fn with_min_temperature(
        start_temperature: f64,
        min_temperature: f64,
        cooling_rate: f64,
        max_neighbors_sampled: u32,
        max_neighbors_accepted: u32,
    ) -> Self {
        Self::with_schedule(
            start_temperature,
            cooling_rate,
            max_neighbors_sampled,
            max_neighbors_accepted,
            SaSchedule::MinTemperature { min_temperature },
        )
    }

    /// Evaluation-budget variant: the per-temperature sample count is
    /// derived so the configured `max_evaluations` spans the whole
    /// temperature range.
    pub fn evaluation_based(
        start_temperature: f64,
        cooling_rate: f64,
        temperature_range: f64,
    ) -> Self {
        Self::with_schedule(
            start_temperature,
            cooling_rate,
            0,
            0,
            SaSchedule::EvaluationBudget {
                temperature_range: Some(temperature_range),
                expected_min_temperature: None,
                neighbors_accepted_ratio: None,
            },
        )
    }

    /// Time-budget variant: each temperature owns an equal slice of the
    /// allowed running time.
    pub fn time_based(
        start_temperature: f64,
        cooling_rate: f64,
        allowed_running_time: Duration,
        temperature_range: f64,
    ) -> Self {
        Self::with_schedule(
            start_temperature,
            cooling_rate,
            0,
            0,
            SaSchedule::TimeBudget {
                allowed_running_time,
                temperature_range: Some(temperature_range),
                expected_min_temperature: None,
                neighbors_accepted_ratio: None,
            },
        )
    }

    /// Reheating variant: restart the temperature when it bottoms out,
    /// for `max_rounds` rounds.
    pub fn with_reheating(
        start_temperature: f64,
        min_temperature: f64,
        cooling_rate: f64,
        max_neighbors_sampled: u32,
        max_neighbors_accepted: u32,
        restart_temperature_ratio: f64,
        max_rounds: u32,
    ) -> Self {
        Self::with_schedule(
            start_temperature,
            cooling_rate,
            max_neighbors_sampled,
            max_neighbors_accepted,
            SaSchedule::Reheating {
                min_temperature,
                restart_temperature_ratio,
                max_rounds,
            },
        )
    }

    /// The current temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Temperature steps completed so far in this run.
    pub fn temperatures_count(&self) -> u32 {
        self.temperatures_count
    }

    pub fn schedule(&self) -> &SaSchedule {
        &self.schedule
    }

    fn min_temperature(&self) -> Option<f64> {
        match &self.schedule {
            SaSchedule::MinTemperature { min_temperature }
            | SaSchedule::Reheating {
                min_temperature, ..
            } => Some(*min_temperature),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.cooling_rate) || self.cooling_rate <= 0.0 {
            return Err(SearchError::incorrect_parameter(
                "cooling_rate",
                "must lie strictly between 0 and 1",
            ));
        }
        if let Some(min) = self.min_temperature() {
            if min <= 0.0 {
                return Err(SearchError::incorrect_parameter(
                    "min_temperature",
                    "should be greater than zero",
                ));
            }
        }
        if let SaSchedule::Reheating {
            restart_temperature_ratio,
            ..
        } = &self.schedule
        {
            if *restart_temperature_ratio <= 0.0 || *restart_temperature_ratio > 1.0 {
                return Err(SearchError::incorrect_parameter(
                    "restart_temperature_ratio",
                    "must lie in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// The temperature range this schedule spans, for deriving the
    /// expected number of temperature steps.
    fn configured_range(&self) -> Result<f64> {
        let (range, expected_min) = match &self.schedule {
            SaSchedule::EvaluationBudget {
                temperature_range,
                expected_min_temperature,
                ..
            }
            | SaSchedule::TimeBudget {
                temperature_range,
                expected_min_temperature,
                ..
            } => (*temperature_range, *expected_min_temperature),
            _ => return Ok(0.0),
        };
        let range = match (range, expected_min) {
            (Some(range), _) => range,
            (None, Some(expected_min)) if expected_min > 0.0 => {
                self.resolved_start / expected_min
            }
            _ => {
                return Err(SearchError::ParameterNotSet(
                    "simulated_annealing.temperature_range".into(),
                ))
            }
        };
        if range <= 1.0 {
            return Err(SearchError::incorrect_parameter(
                "temperature_range",
                "must be greater than 1",
            ));
        }
        Ok(range)
    }

    fn accepted_ratio(&self) -> Option<f64> {
        match &self.schedule {
            SaSchedule::EvaluationBudget {
                neighbors_accepted_ratio,
                ..
            }
            | SaSchedule::TimeBudget {
                neighbors_accepted_ratio,
                ..
            } => *neighbors_accepted_ratio,
            _ => None,
        }
    }

    fn cooling_needed(&self) -> bool {
        if let (Some(window), Some(started)) = (self.window, self.temperature_start) {
            return started.elapsed() >= window
                || (self.max_neighbors_accepted > 0
                    && self.neighbors_accepted >= self.max_neighbors_accepted);
        }
        self.neighbors_sampled >= self.max_neighbors_sampled
            || self.neighbors_accepted >= self.max_neighbors_accepted
    }

    fn cool_down(&mut self) {
        self.temperature *= self.cooling_rate;
        self.temperatures_count += 1;
        self.neighbors_sampled = 0;
        self.neighbors_accepted = 0;
        self.temperature_start = Some(Instant::now());
    }
}

impl<I, S, E> SearchPolicy<I, S, E> for SimulatedAnnealing
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
{
    fn name(&self) -> &str {
        "simulated_annealing"
    }

    fn initialize(&mut self, params: &RunnerParams, ctx: RunContext<'_, I, S, E>) -> Result<()> {
        self.validate()?;

        let RunContext {
            input,
            explorer,
            eval,
            scope,
        } = ctx;

        self.resolved_start = if self.start_temperature > 0.0 {
            self.start_temperature
        } else {
            // Calibrate on the largest delta observed over random probes.
            let (state, rng) = scope.state_and_rng();
            let mut hottest = 0.0f64;
            for _ in 0..TEMPERATURE_PROBE_SAMPLES {
                let mv = explorer.random_move(input, state, rng)?;
                let delta = explorer.delta_cost(input, state, &mv, eval);
                hottest = hottest.max(delta.scalar());
            }
            if hottest > 0.0 {
                hottest
            } else {
                1.0
            }
        };
        self.temperature = self.resolved_start;
        self.neighbors_sampled = 0;
        self.neighbors_accepted = 0;
        self.temperatures_count = 0;
        self.rounds = 0;
        self.run_start = Some(Instant::now());
        self.temperature_start = Some(Instant::now());
        self.window = None;

        match &self.schedule {
            SaSchedule::EvaluationBudget { .. } => {
                let range = self.configured_range()?;
                let expected_temperatures =
                    (-(range.ln()) / self.cooling_rate.ln()).ceil().max(1.0) as u64;
                let max_evaluations = params.max_evaluations.ok_or_else(|| {
                    SearchError::ParameterNotSet("simulated_annealing.max_evaluations".into())
                })?;
                let sampled = max_evaluations / expected_temperatures;
                if sampled == 0 {
                    return Err(SearchError::incorrect_parameter(
                        "max_evaluations",
                        "too small for the configured temperature range",
                    ));
                }
                self.max_neighbors_sampled = sampled.min(u64::from(u32::MAX)) as u32;
                self.max_neighbors_accepted = match self.accepted_ratio() {
                    Some(ratio) => (self.max_neighbors_sampled as f64 * ratio).ceil() as u32,
                    None => self.max_neighbors_sampled,
                };
            }
            SaSchedule::TimeBudget {
                allowed_running_time,
                ..
            } => {
                let range = self.configured_range()?;
                let expected_temperatures =
                    (-(range.ln()) / self.cooling_rate.ln()).ceil().max(1.0) as u32;
                self.window = Some(*allowed_running_time / expected_temperatures);
                if let Some(max_evaluations) = params.max_evaluations {
                    let sampled = max_evaluations / u64::from(expected_temperatures);
                    self.max_neighbors_sampled = sampled.min(u64::from(u32::MAX)) as u32;
                }
                if self.max_neighbors_accepted == 0 {
                    self.max_neighbors_accepted = match self.accepted_ratio() {
                        Some(ratio) => (self.max_neighbors_sampled as f64 * ratio).ceil() as u32,
                        None => self.max_neighbors_sampled,
                    };
                }
            }
            _ => {
                if self.max_neighbors_sampled == 0 {
                    return Err(SearchError::incorrect_parameter(
                        "neighbors_sampled",
                        "must be at least 1",
                    ));
                }
                if self.max_neighbors_accepted == 0 {
                    self.max_neighbors_accepted = self.max_neighbors_sampled;
                }
            }
        }
        Ok(())
    }

    fn select_move(&mut self, ctx: RunContext<'_, I, S, E>) -> Result<Selection<E::Move>> {
        let RunContext {
            input,
            explorer,
            eval,
            scope,
        } = ctx;
        let (state, rng) = scope.state_and_rng();
        Ok(explorer.random_first(input, state, eval, 1, rng, accept_all))
    }

    fn acceptable(&mut self, mv: &EvaluatedMove<E::Move>, ctx: RunContext<'_, I, S, E>) -> bool {
        if mv.cost.cmp_scalar(0) != std::cmp::Ordering::Greater {
            return true;
        }
        if self.temperature <= 0.0 {
            return false;
        }
        let delta = mv.cost.scalar();
        let probability = (-delta / self.temperature).exp();
        ctx.scope.rng_mut().random::<f64>() < probability
    }

    fn complete_iteration(&mut self, accepted: bool, _ctx: RunContext<'_, I, S, E>) {
        self.neighbors_sampled += 1;
        if accepted {
            self.neighbors_accepted += 1;
        }
        if self.cooling_needed() {
            self.cool_down();
        }
        if let SaSchedule::Reheating {
            min_temperature,
            restart_temperature_ratio,
            max_rounds,
        } = &self.schedule
        {
            if self.temperature <= *min_temperature && self.rounds < *max_rounds {
                self.rounds += 1;
                self.temperature = self.resolved_start * restart_temperature_ratio;
                self.neighbors_sampled = 0;
                self.neighbors_accepted = 0;
                self.temperature_start = Some(Instant::now());
            }
        }
    }

    fn stop(&mut self, _ctx: RunContext<'_, I, S, E>) -> bool {
        match &self.schedule {
            SaSchedule::MinTemperature { min_temperature } => {
                self.temperature <= *min_temperature
            }
            SaSchedule::EvaluationBudget { .. } => false,
            SaSchedule::TimeBudget {
                allowed_running_time,
                ..
            } => self
                .run_start
                .map(|start| start.elapsed() >= *allowed_running_time)
                .unwrap_or(false),
            SaSchedule::Reheating {
                min_temperature,
                max_rounds,
                ..
            } => self.temperature <= *min_temperature && self.rounds >= *max_rounds,
        }
    }

    fn status(&self) -> String {
        format!(
            "T = {:.4} ({} sampled, {} accepted)",
            self.temperature, self.neighbors_sampled, self.neighbors_accepted
        )
    }
}

impl Parametrized for SimulatedAnnealing {
    fn component_name(&self) -> &str {
        "simulated_annealing"
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new(
                "start_temperature",
                "Initial temperature (0 calibrates from random probes)",
                ParameterKind::Float,
            ),
            ParameterSpec::new(
                "min_temperature",
                "Temperature at which the run stops",
                ParameterKind::Float,
            ),
            ParameterSpec::new(
                "cooling_rate",
                "Geometric cooling factor in (0, 1)",
                ParameterKind::Float,
            ),
            ParameterSpec::new(
                "neighbors_sampled",
                "Moves sampled per temperature",
                ParameterKind::UInt,
            ),
            ParameterSpec::new(
                "neighbors_accepted",
                "Accepted moves that trigger early cooling",
                ParameterKind::UInt,
            ),
            ParameterSpec::new(
                "temperature_range",
                "Ratio between start and expected final temperature",
                ParameterKind::Float,
            ),
            ParameterSpec::new(
                "allowed_running_time",
                "Time budget in seconds (time-based schedule)",
                ParameterKind::Seconds,
            ),
            ParameterSpec::new(
                "neighbors_accepted_ratio",
                "Fraction of sampled moves allowed to be accepted per temperature",
                ParameterKind::Float,
            ),
        ]
    }

    fn apply_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        let name = "simulated_annealing";
        if let Some(v) = params.get_f64(name, "start_temperature")? {
            self.start_temperature = v;
        }
        if let Some(v) = params.get_f64(name, "cooling_rate")? {
            self.cooling_rate = v;
        }
        if let Some(v) = params.get_u64(name, "neighbors_sampled")? {
            self.max_neighbors_sampled = v.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(v) = params.get_u64(name, "neighbors_accepted")? {
            self.max_neighbors_accepted = v.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(v) = params.get_f64(name, "min_temperature")? {
            match &mut self.schedule {
                SaSchedule::MinTemperature { min_temperature }
                | SaSchedule::Reheating {
                    min_temperature, ..
                } => *min_temperature = v,
                _ => {}
            }
        }
        if let Some(v) = params.get_f64(name, "temperature_range")? {
            match &mut self.schedule {
                SaSchedule::EvaluationBudget {
                    temperature_range, ..
                }
                | SaSchedule::TimeBudget {
                    temperature_range, ..
                } => *temperature_range = Some(v),
                _ => {}
            }
        }
        if let Some(v) = params.get_f64(name, "neighbors_accepted_ratio")? {
            match &mut self.schedule {
                SaSchedule::EvaluationBudget {
                    neighbors_accepted_ratio,
                    ..
                }
                | SaSchedule::TimeBudget {
                    neighbors_accepted_ratio,
                    ..
                } => *neighbors_accepted_ratio = Some(v),
                _ => {}
            }
        }
        if let Some(v) = params.get_seconds(name, "allowed_running_time")? {
            if let SaSchedule::TimeBudget {
                allowed_running_time,
                ..
            } = &mut self.schedule
            {
                *allowed_running_time = v;
            }
        }
        Ok(())
    }
}
