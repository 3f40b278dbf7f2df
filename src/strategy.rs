use crate::backend::SolveStatus;
use crate::error::Result;
use crate::problem::Problem;
use crate::solver::Engine;
use crate::validation;
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: bool,
    pub status: SolveStatus,
    pub assignments_count: usize,
    pub wall_time_secs: f64,
    pub objective_value: Option<f64>,
    pub scheduling_rate: f64,
    pub constraint_violations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub two_phase: RunSummary,
    pub basic: RunSummary,
    pub two_phase_faster: bool,
    pub two_phase_better_quality: bool,
    pub recommendation: String,
}

/// Solves `problem` with both strategies on the engine's configured budgets.
///
/// The basic run gets the sum of both phase budgets. Speed and quality are
/// only compared when both runs produced a schedule.
pub fn compare_strategies(engine: &Engine, problem: &Problem) -> Result<StrategyComparison> {
    let phase1 = engine.config().phase1.time_limit();
    let phase2 = engine.config().phase2.time_limit();

    let two_phase = engine.solve_two_phase(problem, phase1, phase2)?;
    let basic = engine.solve(problem, phase1.saturating_add(phase2))?;

    let two_phase = RunSummary {
        success: two_phase.success,
        status: two_phase.quality.telemetry.status,
        assignments_count: two_phase.assignments.len(),
        wall_time_secs: two_phase.metrics.total_time_secs(),
        objective_value: two_phase.quality.telemetry.objective_value,
        scheduling_rate: two_phase.quality.business.scheduling_rate,
        constraint_violations: validation::validate_hard_constraints(
            &two_phase.assignments,
            problem.units(),
            problem.periods(),
        ),
    };
    let basic = RunSummary {
        success: basic.success,
        status: basic.quality.telemetry.status,
        assignments_count: basic.assignments.len(),
        wall_time_secs: basic.quality.telemetry.wall_time_secs,
        objective_value: basic.quality.telemetry.objective_value,
        scheduling_rate: basic.quality.business.scheduling_rate,
        constraint_violations: validation::validate_hard_constraints(
            &basic.assignments,
            problem.units(),
            problem.periods(),
        ),
    };

    let comparison = analyse(two_phase, basic);
    info!("Strategy comparison: {}", comparison.recommendation);
    Ok(comparison)
}

fn analyse(two_phase: RunSummary, basic: RunSummary) -> StrategyComparison {
    let both = two_phase.success && basic.success;
    let two_phase_faster = both && two_phase.wall_time_secs < basic.wall_time_secs;
    let two_phase_better_quality = both
        && two_phase.objective_value.unwrap_or(f64::INFINITY)
            < basic.objective_value.unwrap_or(f64::INFINITY);

    let recommendation = match (both, two_phase_faster, two_phase_better_quality) {
        (false, _, _) => match (two_phase.success, basic.success) {
            (true, false) => "Use the two-phase strategy: only it found a schedule",
            (false, true) => "Use the basic strategy: only it found a schedule",
            _ => "Neither strategy found a schedule",
        },
        (true, true, true) => "Use the two-phase strategy: faster and better quality",
        (true, true, false) => "Use the two-phase strategy: faster",
        (true, false, true) => "Use the two-phase strategy: better quality",
        (true, false, false) => "Both strategies perform similarly",
    };

    StrategyComparison {
        two_phase,
        basic,
        two_phase_faster,
        two_phase_better_quality,
        recommendation: recommendation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(success: bool, time: f64, objective: Option<f64>) -> RunSummary {
        RunSummary {
            success,
            status: if success { SolveStatus::Feasible } else { SolveStatus::Unknown },
            assignments_count: 0,
            wall_time_secs: time,
            objective_value: objective,
            scheduling_rate: 0.0,
            constraint_violations: Vec::new(),
        }
    }

    #[test]
    fn faster_and_better_two_phase_is_recommended() {
        let c = analyse(summary(true, 1.0, Some(0.5)), summary(true, 2.0, Some(1.0)));
        assert!(c.two_phase_faster);
        assert!(c.two_phase_better_quality);
        assert!(c.recommendation.contains("faster and better"));
    }

    #[test]
    fn equal_runs_are_called_similar() {
        let c = analyse(summary(true, 2.0, Some(1.0)), summary(true, 2.0, Some(1.0)));
        assert!(!c.two_phase_faster);
        assert!(!c.two_phase_better_quality);
        assert_eq!(c.recommendation, "Both strategies perform similarly");
    }

    #[test]
    fn failed_run_is_never_compared() {
        let c = analyse(summary(false, 0.1, None), summary(true, 5.0, Some(3.0)));
        assert!(!c.two_phase_faster);
        assert!(!c.two_phase_better_quality);
        assert!(c.recommendation.contains("basic"));
    }
}
