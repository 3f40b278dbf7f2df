use crate::backend::{self, RunOutcome, SolveStatus, SolverParams};
use crate::config::{EngineConfig, PenaltyWeights};
use crate::data::Assignment;
use crate::error::Result;
use crate::model::Formulation;
use crate::problem::{IndexedProblem, Problem};
use crate::scoring::{self, SolutionQuality, SolverTelemetry, ViolationReport};
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;

/// Result of a single-phase solve.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    pub success: bool,
    pub assignments: Vec<Assignment>,
    pub quality: SolutionQuality,
}

/// Per-phase status and timing of a two-phase solve.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseMetrics {
    pub phase1_status: SolveStatus,
    pub phase1_time_secs: f64,
    pub phase2_status: Option<SolveStatus>,
    pub phase2_time_secs: f64,
    /// Phase 1 failed and the full model was solved directly.
    pub used_fallback: bool,
    /// Phase 2 was seeded with the phase-1 schedule.
    pub hint_applied: bool,
}

impl PhaseMetrics {
    pub fn total_time_secs(&self) -> f64 {
        self.phase1_time_secs + self.phase2_time_secs
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoPhaseOutcome {
    pub success: bool,
    pub assignments: Vec<Assignment>,
    pub metrics: PhaseMetrics,
    pub quality: SolutionQuality,
}

/// Builds and solves timetabling models.
///
/// The engine holds configuration only. Every call indexes the problem and
/// builds fresh models, so independent solves can run on separate threads.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Solves the full model once within `time_limit`.
    pub fn solve(&self, problem: &Problem, time_limit: Duration) -> Result<SolveOutcome> {
        let index = problem.index()?;
        let weights = self.weights_for(problem)?;
        info!(
            "Solving {} units over {} periods for tenant '{}'.",
            index.num_units(),
            index.num_periods(),
            problem.tenant_id()
        );

        if let Some(outcome) = self.trivial_outcome(&index, &weights) {
            return Ok(outcome);
        }

        let params = self.params(time_limit, self.config.phase1.workers);
        let run = backend::run(Formulation::full(&index, &weights), &params, None);
        Ok(self.finish(&index, &weights, &run))
    }

    /// Solves with the configured phase budgets.
    pub fn solve_two_phase_default(&self, problem: &Problem) -> Result<TwoPhaseOutcome> {
        self.solve_two_phase(
            problem,
            self.config.phase1.time_limit(),
            self.config.phase2.time_limit(),
        )
    }

    /// Proves feasibility with hard constraints only, then optimizes the full
    /// model seeded with that schedule.
    ///
    /// If phase 1 finds nothing, the full model is solved directly with both
    /// budgets combined. If phase 2 finds nothing, the phase-1 schedule is
    /// returned.
    pub fn solve_two_phase(
        &self,
        problem: &Problem,
        phase1_limit: Duration,
        phase2_limit: Duration,
    ) -> Result<TwoPhaseOutcome> {
        let index = problem.index()?;
        let weights = self.weights_for(problem)?;
        info!(
            "Two-phase solve of {} units over {} periods for tenant '{}'.",
            index.num_units(),
            index.num_periods(),
            problem.tenant_id()
        );

        if let Some(outcome) = self.trivial_outcome(&index, &weights) {
            let status = outcome.quality.telemetry.status;
            return Ok(TwoPhaseOutcome {
                success: outcome.success,
                assignments: outcome.assignments,
                metrics: PhaseMetrics {
                    phase1_status: status,
                    phase1_time_secs: 0.0,
                    phase2_status: None,
                    phase2_time_secs: 0.0,
                    used_fallback: false,
                    hint_applied: false,
                },
                quality: outcome.quality,
            });
        }

        info!("Phase 1: feasibility.");
        let phase1_params = self.params(phase1_limit, self.config.phase1.workers);
        let phase1 = backend::run(Formulation::feasibility(&index), &phase1_params, None);

        let Some(hint) = phase1.placement.as_deref() else {
            warn!(
                "Phase 1 ended {}; solving the full model directly.",
                phase1.status
            );
            let fallback_params = self.params(
                phase1_limit.saturating_add(phase2_limit),
                self.config.phase1.workers,
            );
            let fallback =
                backend::run(Formulation::full(&index, &weights), &fallback_params, None);
            let outcome = self.finish(&index, &weights, &fallback);
            if !outcome.success {
                warn!("Fallback ended {}; no schedule.", fallback.status);
            }
            return Ok(TwoPhaseOutcome {
                success: outcome.success,
                assignments: outcome.assignments,
                metrics: PhaseMetrics {
                    phase1_status: phase1.status,
                    phase1_time_secs: phase1.wall_time.as_secs_f64(),
                    phase2_status: Some(fallback.status),
                    phase2_time_secs: fallback.wall_time.as_secs_f64(),
                    used_fallback: true,
                    hint_applied: false,
                },
                quality: outcome.quality,
            });
        };

        info!("Phase 2: optimization from the phase-1 schedule.");
        let phase2_params = self.params(phase2_limit, self.config.phase2.workers);
        let phase2 = backend::run(Formulation::full(&index, &weights), &phase2_params, Some(hint));

        let outcome = if phase2.placement.is_some() {
            self.finish(&index, &weights, &phase2)
        } else {
            warn!("Phase 2 ended {}; keeping the phase-1 schedule.", phase2.status);
            self.finish(&index, &weights, &unoptimized(&phase1))
        };

        Ok(TwoPhaseOutcome {
            success: outcome.success,
            assignments: outcome.assignments,
            metrics: PhaseMetrics {
                phase1_status: phase1.status,
                phase1_time_secs: phase1.wall_time.as_secs_f64(),
                phase2_status: Some(phase2.status),
                phase2_time_secs: phase2.wall_time.as_secs_f64(),
                used_fallback: false,
                hint_applied: true,
            },
            quality: outcome.quality,
        })
    }

    /// Scores any assignment list against the problem without solving.
    pub fn evaluate(
        &self,
        problem: &Problem,
        assignments: &[Assignment],
    ) -> Result<ViolationReport> {
        let index = problem.index()?;
        let weights = self.weights_for(problem)?;
        let placement = scoring::placement_of(&index, assignments);
        Ok(scoring::score_placement(&index, &placement, &weights))
    }

    fn weights_for(&self, problem: &Problem) -> Result<PenaltyWeights> {
        self.config.weights.with_overrides(problem.constraints())
    }

    fn params(&self, time_limit: Duration, workers: u32) -> SolverParams {
        SolverParams::new(
            time_limit,
            workers,
            self.config.random_seed,
            self.config.log_solver_output,
        )
    }

    /// Outcomes that need no solver: nothing to schedule, or certain infeasibility.
    fn trivial_outcome(
        &self,
        index: &IndexedProblem<'_>,
        weights: &PenaltyWeights,
    ) -> Option<SolveOutcome> {
        if index.num_units() == 0 {
            info!("Nothing to schedule.");
            let run = RunOutcome {
                status: SolveStatus::Optimal,
                placement: Some(Vec::new()),
                objective_value: Some(0.0),
                penalty_values: Vec::new(),
                wall_time: Duration::ZERO,
            };
            return Some(self.finish(index, weights, &run));
        }
        let reason = index.screen()?;
        warn!("Infeasible before solving: {}", reason);
        Some(self.finish(
            index,
            weights,
            &RunOutcome::without_solution(SolveStatus::Infeasible, Duration::ZERO),
        ))
    }

    fn finish(
        &self,
        index: &IndexedProblem<'_>,
        weights: &PenaltyWeights,
        run: &RunOutcome,
    ) -> SolveOutcome {
        let placement: Vec<Option<usize>> = match &run.placement {
            Some(periods) => periods.iter().copied().map(Some).collect(),
            None => vec![None; index.num_units()],
        };
        let assignments = run
            .placement
            .as_deref()
            .map(|periods| extract_assignments(index, periods))
            .unwrap_or_default();

        let violations = scoring::score_placement(index, &placement, weights);
        let mut telemetry = SolverTelemetry::from_run(run);
        if run.placement.is_some() && telemetry.objective_value.is_none() {
            // hard-only run: report what the schedule would score
            telemetry.objective_value = Some(violations.total_penalty);
        }

        SolveOutcome {
            success: run.status.has_solution(),
            assignments,
            quality: SolutionQuality {
                telemetry,
                business: scoring::business_metrics(index, &placement),
                violations,
            },
        }
    }
}

/// A hard-only schedule never had its penalties minimised, so it is at best
/// feasible whatever the feasibility model reported.
fn unoptimized(phase1: &RunOutcome) -> RunOutcome {
    RunOutcome {
        status: SolveStatus::Feasible,
        ..phase1.clone()
    }
}

/// One assignment per unit, locked pins keeping their flag and room.
pub fn extract_assignments(index: &IndexedProblem<'_>, placement: &[usize]) -> Vec<Assignment> {
    let problem = index.problem;
    let mut assignments: Vec<Assignment> = placement
        .iter()
        .enumerate()
        .map(|(i, &j)| Assignment {
            tenant_id: problem.tenant_id().to_string(),
            unit_id: problem.units()[i].id,
            period_id: problem.periods()[j].id,
            room_id: index.unit_room[i],
            week_pattern_id: None,
            is_locked: index.pins.iter().any(|&(pi, pj, _)| pi == i && pj == j),
        })
        .collect();
    assignments.sort();
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExistingAssignment, Teacher, TeachingUnit, TimePeriod, Weekday};

    fn problem_with(units: u32, periods: u32) -> Problem {
        let mut problem = Problem::new("tenant");
        problem.add_teacher(Teacher::new(1, "A"));
        for id in 1..=periods {
            problem.add_period(TimePeriod {
                id,
                day: Weekday::Monday,
                start_minute: 480 + 60 * id as u16,
                end_minute: 525 + 60 * id as u16,
                period_number: id,
                is_break: false,
            });
        }
        for id in 1..=units {
            problem.add_unit(TeachingUnit::new(id, id, id, 1));
        }
        problem
    }

    #[test]
    fn empty_problem_succeeds_without_solver() {
        let engine = Engine::default();
        let outcome = engine.solve(&Problem::new("t"), Duration::from_secs(1)).unwrap();
        assert!(outcome.success);
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.quality.business.scheduling_rate, 0.0);
    }

    #[test]
    fn more_units_than_periods_fails_without_solver() {
        let engine = Engine::default();
        let outcome = engine.solve(&problem_with(3, 2), Duration::from_secs(1)).unwrap();
        assert!(!outcome.success);
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.quality.telemetry.status, SolveStatus::Infeasible);

        let two_phase = engine
            .solve_two_phase(&problem_with(3, 2), Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        assert!(!two_phase.success);
        assert_eq!(two_phase.metrics.phase1_status, SolveStatus::Infeasible);
        assert!(!two_phase.metrics.used_fallback);
    }

    #[test]
    fn index_errors_surface_as_errors() {
        let mut problem = problem_with(1, 1);
        problem.add_existing_assignment(ExistingAssignment {
            unit_id: 99,
            period_id: 1,
            room_id: None,
            is_locked: true,
        });
        assert!(Engine::default().solve(&problem, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn extraction_marks_locked_pins() {
        let mut problem = problem_with(2, 3);
        problem.add_existing_assignment(ExistingAssignment {
            unit_id: 2,
            period_id: 3,
            room_id: None,
            is_locked: true,
        });
        let index = problem.index().unwrap();
        let assignments = extract_assignments(&index, &[0, 2]);
        assert_eq!(assignments.len(), 2);
        assert_eq!((assignments[0].unit_id, assignments[0].period_id), (1, 1));
        assert!(!assignments[0].is_locked);
        assert_eq!((assignments[1].unit_id, assignments[1].period_id), (2, 3));
        assert!(assignments[1].is_locked);
        assert!(assignments.iter().all(|a| a.tenant_id == "tenant"));
    }

    #[test]
    fn kept_phase1_schedule_is_only_feasible() {
        let phase1 = RunOutcome {
            status: SolveStatus::Optimal,
            placement: Some(vec![1, 0]),
            objective_value: None,
            penalty_values: Vec::new(),
            wall_time: Duration::from_millis(5),
        };
        let kept = unoptimized(&phase1);
        assert_eq!(kept.status, SolveStatus::Feasible);
        assert_eq!(kept.placement, Some(vec![1, 0]));

        let problem = problem_with(2, 3);
        let index = problem.index().unwrap();
        let engine = Engine::default();
        let weights = PenaltyWeights::default();
        let outcome = engine.finish(&index, &weights, &kept);
        assert!(outcome.success);
        assert_eq!(outcome.quality.telemetry.status, SolveStatus::Feasible);
        assert_eq!(outcome.quality.telemetry.best_objective_bound, None);
        assert_eq!(
            outcome.quality.telemetry.objective_value,
            Some(outcome.quality.violations.total_penalty)
        );
    }

    #[test]
    fn engine_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.weights.balanced_distribution = 2.0;
        assert!(Engine::new(config).is_err());
    }
}
