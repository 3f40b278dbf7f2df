use crate::backend::{RunOutcome, SolveStatus};
use crate::config::{PenaltyFamily, PenaltyWeights};
use crate::data::{Assignment, TeacherId, UnmetSoftConstraint};
use crate::problem::IndexedProblem;
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;

/// Raw figures reported by the solver run that produced the schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverTelemetry {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub best_objective_bound: Option<f64>,
    pub wall_time_secs: f64,
    /// Not exposed by the MILP backend.
    pub num_conflicts: Option<u64>,
    /// Not exposed by the MILP backend.
    pub num_branches: Option<u64>,
}

impl SolverTelemetry {
    pub fn from_run(run: &RunOutcome) -> Self {
        Self {
            status: run.status,
            objective_value: run.objective_value,
            best_objective_bound: match run.status {
                SolveStatus::Optimal => run.objective_value,
                _ => None,
            },
            wall_time_secs: run.wall_time.as_secs_f64(),
            num_conflicts: None,
            num_branches: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherUtilization {
    pub teacher_id: TeacherId,
    pub scheduled_hours: u32,
    pub max_hours_per_week: u32,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMetrics {
    pub total_units: usize,
    pub scheduled_units: usize,
    /// Scheduled units over total units; 0 when there are no units.
    pub scheduling_rate: f64,
    pub teacher_utilization: Vec<TeacherUtilization>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyBreakdown {
    pub family: PenaltyFamily,
    pub weight: f64,
    /// Number of individual violation events.
    pub violations: u32,
    /// Unweighted penalty measure, as the model's penalty variable defines it.
    pub measure: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub families: Vec<PenaltyBreakdown>,
    pub total_penalty: f64,
    pub is_feasible: bool,
    pub unmet: Vec<UnmetSoftConstraint>,
}

impl ViolationReport {
    pub fn family(&self, family: PenaltyFamily) -> Option<&PenaltyBreakdown> {
        self.families.iter().find(|b| b.family == family)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionQuality {
    pub telemetry: SolverTelemetry,
    pub business: BusinessMetrics,
    pub violations: ViolationReport,
}

/// Maps assignments onto period indices per unit. Assignments for unknown
/// units or periods are skipped; a unit placed twice keeps its first period.
pub fn placement_of(index: &IndexedProblem<'_>, assignments: &[Assignment]) -> Vec<Option<usize>> {
    let mut placement = vec![None; index.num_units()];
    for assignment in assignments {
        let (Ok(i), Ok(j)) = (
            index.problem.unit_index(assignment.unit_id),
            index.problem.period_index(assignment.period_id),
        ) else {
            continue;
        };
        placement[i].get_or_insert(j);
    }
    placement
}

pub fn business_metrics(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
) -> BusinessMetrics {
    let total_units = index.num_units();
    let scheduled_units = placement.iter().flatten().count();
    let scheduling_rate = if total_units == 0 {
        0.0
    } else {
        scheduled_units as f64 / total_units as f64
    };

    let teacher_utilization = index
        .problem
        .teachers()
        .iter()
        .zip(&index.teacher_units)
        .map(|(teacher, units)| {
            let scheduled_hours = units.iter().filter(|&&i| placement[i].is_some()).count() as u32;
            let utilization = if teacher.max_hours_per_week == 0 {
                0.0
            } else {
                f64::from(scheduled_hours) / f64::from(teacher.max_hours_per_week)
            };
            TeacherUtilization {
                teacher_id: teacher.id,
                scheduled_hours,
                max_hours_per_week: teacher.max_hours_per_week,
                utilization,
            }
        })
        .collect();

    BusinessMetrics {
        total_units,
        scheduled_units,
        scheduling_rate,
        teacher_utilization,
    }
}

/// Recomputes every penalty family from the placement alone, so schedules
/// from the hard-only phase or from outside the engine can be scored too.
pub fn score_placement(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    weights: &PenaltyWeights,
) -> ViolationReport {
    let mut unmet = Vec::new();
    let families: Vec<PenaltyBreakdown> = PenaltyFamily::ALL
        .into_iter()
        .map(|family| {
            let measure_family = match family {
                PenaltyFamily::TeacherPreference => teacher_preference,
                PenaltyFamily::RoomFit => room_fit,
                PenaltyFamily::BalancedDistribution => balanced_distribution,
                PenaltyFamily::CompactSchedule => compact_schedule,
                PenaltyFamily::ConsecutiveGrouping => consecutive_grouping,
            };
            let (violations, measure) = measure_family(index, placement, &mut unmet);
            let weight = weights.get(family);
            PenaltyBreakdown {
                family,
                weight,
                violations,
                measure,
                penalty: weight * measure,
            }
        })
        .collect();

    let total_penalty: f64 = families.iter().map(|b| b.penalty).sum();
    ViolationReport {
        families,
        total_penalty,
        is_feasible: total_penalty.abs() < 1e-9,
        unmet,
    }
}

fn unmet_entry(family: PenaltyFamily, description: String) -> UnmetSoftConstraint {
    UnmetSoftConstraint {
        constraint_type: family.name().to_string(),
        description,
    }
}

fn teacher_preference(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> (u32, f64) {
    let mut violations = 0;
    for (i, slot) in placement.iter().enumerate() {
        let Some(j) = *slot else { continue };
        let teacher = index.teacher_of(i);
        let period = &index.problem.periods()[j];
        if teacher.dislikes(&period.key()) {
            violations += 1;
            unmet.push(unmet_entry(
                PenaltyFamily::TeacherPreference,
                format!(
                    "Unit {} is scheduled at {}, outside the preferred periods of teacher {}.",
                    index.problem.units()[i].id,
                    period.key(),
                    teacher.id
                ),
            ));
        }
    }
    (violations, f64::from(violations))
}

fn room_fit(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> (u32, f64) {
    let mut violations = 0;
    let mut waste_total = 0u32;
    for (i, waste) in index.room_waste().into_iter().enumerate() {
        if placement[i].is_none() || waste == 0 {
            continue;
        }
        violations += 1;
        waste_total += waste;
        let room = index.unit_room[i].map(|r| r.to_string()).unwrap_or_default();
        unmet.push(unmet_entry(
            PenaltyFamily::RoomFit,
            format!(
                "Unit {} uses room {} with {} seats to spare.",
                index.problem.units()[i].id,
                room,
                waste
            ),
        ));
    }
    (violations, f64::from(waste_total))
}

fn balanced_distribution(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> (u32, f64) {
    let days = index.num_days();
    if days == 0 {
        return (0, 0.0);
    }
    let mut violations = 0;
    let mut total = 0.0;
    for (g, units) in index.group_units.iter().enumerate() {
        if units.len() <= 2 {
            continue;
        }
        let mut per_day = vec![0u32; days];
        for &i in units {
            if let Some(d) = placement[i].and_then(|j| index.period_day[j]) {
                per_day[d] += 1;
            }
        }
        let mean = per_day.iter().map(|&c| f64::from(c)).sum::<f64>() / days as f64;
        let variance = per_day
            .iter()
            .map(|&c| (f64::from(c) - mean).powi(2))
            .sum::<f64>()
            / days as f64;
        if variance > 1e-9 {
            violations += 1;
            total += variance;
            unmet.push(unmet_entry(
                PenaltyFamily::BalancedDistribution,
                format!(
                    "Class group {} has daily loads {:?} (variance {:.3}).",
                    index.group_ids[g], per_day, variance
                ),
            ));
        }
    }
    (violations, total)
}

fn compact_schedule(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> (u32, f64) {
    let mut violations = 0;
    for (g, units) in index.group_units.iter().enumerate() {
        let used: HashSet<usize> = units.iter().filter_map(|&i| placement[i]).collect();
        for layout in &index.days {
            let transitions = layout
                .periods
                .iter()
                .map(|j| used.contains(j))
                .tuple_windows()
                .filter(|(a, b)| a != b)
                .count() as u32;
            if transitions > 0 {
                violations += transitions;
                unmet.push(unmet_entry(
                    PenaltyFamily::CompactSchedule,
                    format!(
                        "Class group {} has {} gap transitions on {}.",
                        index.group_ids[g], transitions, layout.day
                    ),
                ));
            }
        }
    }
    (violations, f64::from(violations))
}

fn consecutive_grouping(
    index: &IndexedProblem<'_>,
    placement: &[Option<usize>],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> (u32, f64) {
    let mut violations = 0;
    for (i, partners) in index.partners.iter().enumerate() {
        let Some(j) = placement[i] else { continue };
        if partners.is_empty() {
            continue;
        }
        let grouped = partners
            .iter()
            .filter_map(|&s| placement[s])
            .any(|k| index.neighbours[j].contains(&k));
        if !grouped {
            violations += 1;
            unmet.push(unmet_entry(
                PenaltyFamily::ConsecutiveGrouping,
                format!(
                    "Unit {} needs consecutive hours but no partner unit sits next to {}.",
                    index.problem.units()[i].id,
                    index.problem.periods()[j].key()
                ),
            ));
        }
    }
    (violations, f64::from(violations))
}
