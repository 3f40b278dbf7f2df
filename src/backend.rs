use crate::config::PenaltyFamily;
use crate::model::Formulation;
use good_lp::solvers::highs::{HighsProblem, HighsSolution, highs};
use good_lp::solvers::{SolutionStatus, WithInitialSolution};
use good_lp::{ResolutionError, Solution, SolverModel, Variable};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Outcome class of one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    /// A valid schedule, not proven optimal within the time limit.
    Feasible,
    Infeasible,
    /// No schedule and no proof of infeasibility.
    Unknown,
}

impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }

    pub fn name(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub time_limit: Duration,
    pub workers: u32,
    pub random_seed: i32,
    pub log_output: bool,
}

impl SolverParams {
    pub fn new(time_limit: Duration, workers: u32, random_seed: i32, log_output: bool) -> Self {
        Self {
            time_limit,
            workers,
            random_seed,
            log_output,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: SolveStatus,
    /// Period index of every unit, when a schedule was found.
    pub placement: Option<Vec<usize>>,
    /// Weighted penalty sum; `None` for hard-only models or without a schedule.
    pub objective_value: Option<f64>,
    pub penalty_values: Vec<(PenaltyFamily, f64)>,
    pub wall_time: Duration,
}

impl RunOutcome {
    pub fn without_solution(status: SolveStatus, wall_time: Duration) -> Self {
        Self {
            status,
            placement: None,
            objective_value: None,
            penalty_values: Vec::new(),
            wall_time,
        }
    }
}

/// Solves the formulation. `hint` gives a starting period for each unit.
pub fn run(formulation: Formulation, params: &SolverParams, hint: Option<&[usize]>) -> RunOutcome {
    let Formulation {
        vars,
        assign,
        constraints,
        penalties,
        objective,
        ..
    } = formulation;

    let mut model = configure(vars.minimise(objective).using(highs), params);

    if let Some(hint) = hint {
        let values: Vec<(Variable, f64)> = assign
            .iter()
            .zip(hint)
            .flat_map(|(row, &chosen)| {
                row.iter()
                    .enumerate()
                    .map(move |(j, &var)| (var, if j == chosen { 1.0 } else { 0.0 }))
            })
            .collect();
        debug!("Seeding solver with {} hint values.", values.len());
        model = model.with_initial_solution(values);
    }

    for c in constraints {
        model.add_constraint(c);
    }

    info!(
        "Starting HiGHS (time limit {:.1}s, {} workers)...",
        params.time_limit.as_secs_f64(),
        params.workers
    );
    let start_time = Instant::now();
    let result = model.solve();
    let wall_time = start_time.elapsed();

    let solution = match result {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => {
            info!("Model proven infeasible in {:.2?}", wall_time);
            return RunOutcome::without_solution(SolveStatus::Infeasible, wall_time);
        }
        // every variable is bounded and the objective is non-negative, so an
        // "infeasible or unbounded" verdict from presolve means infeasible
        Err(ResolutionError::Unbounded) => {
            info!("Model reported infeasible or unbounded in {:.2?}", wall_time);
            return RunOutcome::without_solution(SolveStatus::Infeasible, wall_time);
        }
        Err(e) => {
            warn!("Solver stopped without a schedule after {:.2?}: {}", wall_time, e);
            return RunOutcome::without_solution(SolveStatus::Unknown, wall_time);
        }
    };

    let Some(placement) = read_placement(&solution, &assign) else {
        warn!("Solver returned values that do not form a schedule; discarding them.");
        return RunOutcome::without_solution(SolveStatus::Unknown, wall_time);
    };

    let status = match solution.status() {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        _ => SolveStatus::Feasible,
    };
    let penalty_values: Vec<(PenaltyFamily, f64)> = penalties
        .iter()
        .map(|term| (term.family, solution.value(term.var)))
        .collect();
    let objective_value = (!penalties.is_empty()).then(|| {
        penalties
            .iter()
            .map(|term| term.weight * solution.value(term.var))
            .sum()
    });

    info!("{} schedule found in {:.2?}", status, wall_time);
    RunOutcome {
        status,
        placement: Some(placement),
        objective_value,
        penalty_values,
        wall_time,
    }
}

fn configure(model: HighsProblem, params: &SolverParams) -> HighsProblem {
    // HiGHS keeps one thread pool per process, so parallelism is toggled
    // instead of sizing the pool per solve.
    let parallel = if params.workers > 1 { "on" } else { "off" };
    model
        .set_option("time_limit", params.time_limit.as_secs_f64().max(0.01))
        .set_option("random_seed", params.random_seed)
        .set_option("parallel", parallel)
        .set_option("log_to_console", if params.log_output { "true" } else { "false" })
}

/// Exactly one period per unit, or nothing.
fn read_placement(solution: &HighsSolution, assign: &[Vec<Variable>]) -> Option<Vec<usize>> {
    assign
        .iter()
        .map(|row| {
            let mut chosen = row
                .iter()
                .enumerate()
                .filter(|(_, var)| solution.value(**var) > 0.5)
                .map(|(j, _)| j);
            match (chosen.next(), chosen.next()) {
                (Some(j), None) => Some(j),
                _ => None,
            }
        })
        .collect()
}
