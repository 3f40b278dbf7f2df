use crate::data::{Assignment, ExistingAssignment, PeriodId, TeachingUnit, TimePeriod, UnitId};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// Checks teacher, class group and period double-booking.
///
/// Returns one human-readable line per violation; the list is empty exactly
/// when all three exclusivity rules hold. References to units missing from
/// `units` are reported by [`unknown_units`] instead.
pub fn validate_hard_constraints(
    assignments: &[Assignment],
    units: &[TeachingUnit],
    periods: &[TimePeriod],
) -> Vec<String> {
    let mut violations = teacher_conflicts(assignments, units, periods);
    violations.extend(class_group_conflicts(assignments, units, periods));
    violations.extend(period_conflicts(assignments, periods));
    violations
}

pub fn unknown_units(assignments: &[Assignment], units: &[TeachingUnit]) -> Vec<String> {
    let known: HashSet<UnitId> = units.iter().map(|u| u.id).collect();
    assignments
        .iter()
        .filter(|a| !known.contains(&a.unit_id))
        .map(|a| format!("Assignment references unknown unit {}", a.unit_id))
        .collect()
}

pub fn teacher_conflicts(
    assignments: &[Assignment],
    units: &[TeachingUnit],
    periods: &[TimePeriod],
) -> Vec<String> {
    conflicts_by(assignments, units, periods, "Teacher", |u| u.teacher_id)
}

pub fn class_group_conflicts(
    assignments: &[Assignment],
    units: &[TeachingUnit],
    periods: &[TimePeriod],
) -> Vec<String> {
    conflicts_by(assignments, units, periods, "Class group", |u| u.class_group_id)
}

/// Every period may hold at most one unit.
pub fn period_conflicts(assignments: &[Assignment], periods: &[TimePeriod]) -> Vec<String> {
    let labels = period_labels(periods);
    assignments
        .iter()
        .map(|a| (a.period_id, a.unit_id))
        .into_group_map()
        .into_iter()
        .filter(|(_, units)| units.len() > 1)
        .sorted_by_key(|(period_id, _)| *period_id)
        .map(|(period_id, units)| {
            format!(
                "Period {} is occupied by {} units: {}",
                label(&labels, period_id),
                units.len(),
                units.iter().join(", ")
            )
        })
        .collect()
}

/// Locked assignments that are missing from, or moved in, `assignments`.
pub fn locked_violations(
    assignments: &[Assignment],
    existing: &[ExistingAssignment],
) -> Vec<String> {
    let placed: HashSet<(UnitId, PeriodId)> =
        assignments.iter().map(|a| (a.unit_id, a.period_id)).collect();
    existing
        .iter()
        .filter(|e| e.is_locked && !placed.contains(&(e.unit_id, e.period_id)))
        .map(|e| format!("Locked unit {} is no longer in period {}", e.unit_id, e.period_id))
        .collect()
}

fn conflicts_by<K>(
    assignments: &[Assignment],
    units: &[TeachingUnit],
    periods: &[TimePeriod],
    owner: &str,
    key: impl Fn(&TeachingUnit) -> K,
) -> Vec<String>
where
    K: std::hash::Hash + Eq + std::fmt::Display + Copy,
{
    let unit_map: HashMap<UnitId, &TeachingUnit> = units.iter().map(|u| (u.id, u)).collect();
    let labels = period_labels(periods);
    let mut seen: HashSet<(K, PeriodId)> = HashSet::new();
    let mut violations = Vec::new();

    for assignment in assignments {
        let Some(&unit) = unit_map.get(&assignment.unit_id) else {
            continue;
        };
        let owner_id = key(unit);
        if !seen.insert((owner_id, assignment.period_id)) {
            violations.push(format!(
                "{} {} has a conflict in period {}",
                owner,
                owner_id,
                label(&labels, assignment.period_id)
            ));
        }
    }
    violations
}

fn period_labels(periods: &[TimePeriod]) -> HashMap<PeriodId, String> {
    periods.iter().map(|p| (p.id, p.to_string())).collect()
}

fn label(labels: &HashMap<PeriodId, String>, period_id: PeriodId) -> String {
    labels
        .get(&period_id)
        .cloned()
        .unwrap_or_else(|| period_id.to_string())
}
