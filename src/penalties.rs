//! Soft constraint families.
//!
//! Every family owns one penalty variable that is pinned by an equality to
//! the family's true violation measure. Indicators that feed a measure are
//! reified in both directions, so a penalty can be neither understated nor
//! inflated by the solver. The solver-free scorer in `scoring` uses the same
//! definitions.

use crate::config::{PenaltyFamily, PenaltyWeights};
use crate::model::{Formulation, PenaltyTerm};
use crate::problem::IndexedProblem;
use good_lp::{Expression, Variable, constraint, variable};
use log::trace;

pub fn add_penalties(
    formulation: &mut Formulation,
    index: &IndexedProblem<'_>,
    weights: &PenaltyWeights,
) {
    for family in PenaltyFamily::ALL {
        let before = formulation.constraints.len();
        let var = match family {
            PenaltyFamily::TeacherPreference => teacher_preference(formulation, index),
            PenaltyFamily::RoomFit => room_fit(formulation, index),
            PenaltyFamily::BalancedDistribution => balanced_distribution(formulation, index),
            PenaltyFamily::CompactSchedule => compact_schedule(formulation, index),
            PenaltyFamily::ConsecutiveGrouping => consecutive_grouping(formulation, index),
        };
        trace!(
            "  {} penalty: {} constraints, weight {}",
            family,
            formulation.constraints.len() - before,
            weights.get(family)
        );
        formulation.penalties.push(PenaltyTerm {
            family,
            weight: weights.get(family),
            var,
        });
    }
}

fn count_var(formulation: &mut Formulation) -> Variable {
    formulation.vars.add(variable().integer().min(0))
}

fn binary_var(formulation: &mut Formulation) -> Variable {
    formulation.vars.add(variable().binary())
}

/// Units placed outside their teacher's preferred periods.
fn teacher_preference(formulation: &mut Formulation, index: &IndexedProblem<'_>) -> Variable {
    let periods = index.problem.periods();
    let dispreferred: Expression = (0..index.num_units())
        .flat_map(move |i| {
            let teacher = index.teacher_of(i);
            periods
                .iter()
                .enumerate()
                .filter(move |(_, p)| teacher.dislikes(&p.key()))
                .map(move |(j, _)| (i, j))
        })
        .map(|(i, j)| formulation.assign[i][j])
        .sum();
    let penalty = count_var(formulation);
    formulation.constraints.push(constraint!(penalty == dispreferred));
    penalty
}

/// Seats wasted by each unit's room. Rooms do not depend on the period while
/// every period holds a single unit, so this is a constant of the problem.
fn room_fit(formulation: &mut Formulation, index: &IndexedProblem<'_>) -> Variable {
    let waste: u32 = index.room_waste().iter().sum();
    let penalty = formulation.vars.add(variable().min(0));
    let waste = f64::from(waste);
    formulation.constraints.push(constraint!(penalty == waste));
    penalty
}

/// Variance of per-weekday unit counts for class groups with more than two units.
///
/// With n units over D days the mean is fixed at n / D, so the variance is
/// `sum(c_d^2) / D - (n / D)^2`. Each `c_d^2` is linearised through a one-hot
/// encoding of the count `c_d`.
fn balanced_distribution(formulation: &mut Formulation, index: &IndexedProblem<'_>) -> Variable {
    let penalty = formulation.vars.add(variable().min(0));
    let days = index.num_days() as f64;
    let mut variance = Expression::from(0.0);

    if days > 0.0 {
        for units in index.group_units.iter().filter(|u| u.len() > 2) {
            let n = units.len() as f64;
            let mut squares = Expression::from(0.0);
            for layout in &index.days {
                let count: Expression = layout
                    .periods
                    .iter()
                    .map(|&j| formulation.occupancy(units, j))
                    .sum();
                let max_count = units.len().min(layout.periods.len());
                let one_hot: Vec<Variable> =
                    (0..=max_count).map(|_| binary_var(formulation)).collect();

                let picked: Expression = one_hot.iter().copied().sum();
                formulation.constraints.push(constraint!(picked == 1));
                let encoded: Expression = one_hot
                    .iter()
                    .enumerate()
                    .map(|(k, &b)| k as f64 * Expression::from(b))
                    .sum();
                formulation.constraints.push(constraint!(encoded == count));

                squares += one_hot
                    .iter()
                    .enumerate()
                    .map(|(k, &b)| (k * k) as f64 * Expression::from(b))
                    .sum::<Expression>();
            }
            variance += (1.0 / days) * squares - (n / days).powi(2);
        }
    }

    formulation.constraints.push(constraint!(penalty == variance));
    penalty
}

/// Occupied/free transitions between adjacent periods of each class group's day.
fn compact_schedule(formulation: &mut Formulation, index: &IndexedProblem<'_>) -> Variable {
    let mut transitions = Vec::new();
    for units in &index.group_units {
        for layout in &index.days {
            let occupied: Vec<Expression> = layout
                .periods
                .iter()
                .map(|&j| formulation.occupancy(units, j))
                .collect();
            for pair in occupied.windows(2) {
                let (a, b) = (pair[0].clone(), pair[1].clone());
                let t = binary_var(formulation);
                // t == a xor b
                formulation.constraints.push(constraint!(t >= a.clone() - b.clone()));
                formulation.constraints.push(constraint!(t >= b.clone() - a.clone()));
                formulation.constraints.push(constraint!(t <= a.clone() + b.clone()));
                formulation.constraints.push(constraint!(Expression::from(t) + a + b <= 2));
                transitions.push(t);
            }
        }
    }
    let penalty = count_var(formulation);
    let total: Expression = transitions.into_iter().sum();
    formulation.constraints.push(constraint!(penalty == total));
    penalty
}

/// Multi-hour units with no partner unit in a neighbouring period.
///
/// For unit i in period j: `near` is 1 when some partner sits next to j and
/// `both` is `assign[i][j] and near`. A unit is grouped in at most one
/// period, so the penalty is the flagged count minus all grouped indicators.
fn consecutive_grouping(formulation: &mut Formulation, index: &IndexedProblem<'_>) -> Variable {
    let mut flagged = 0u32;
    let mut grouped = Vec::new();
    for (i, partners) in index.partners.iter().enumerate() {
        if partners.is_empty() {
            continue;
        }
        flagged += 1;
        for j in 0..index.num_periods() {
            let neighbours = &index.neighbours[j];
            if neighbours.is_empty() || !index.allowed[i][j] {
                continue;
            }
            let partner_load: Expression = neighbours
                .iter()
                .map(|&k| formulation.occupancy(partners, k))
                .sum();
            let big_m = (partners.len() * neighbours.len()) as f64;
            let x = formulation.assign[i][j];
            let near = binary_var(formulation);
            let both = binary_var(formulation);
            formulation.constraints.push(constraint!(near <= partner_load.clone()));
            formulation
                .constraints
                .push(constraint!(partner_load <= big_m * Expression::from(near)));
            formulation.constraints.push(constraint!(both <= x));
            formulation.constraints.push(constraint!(both <= near));
            formulation.constraints.push(constraint!(both >= Expression::from(x) + near - 1.0));
            grouped.push(both);
        }
    }
    let penalty = count_var(formulation);
    let grouped: Expression = grouped.into_iter().sum();
    let flagged = f64::from(flagged);
    formulation.constraints.push(constraint!(Expression::from(penalty) + grouped == flagged));
    penalty
}
