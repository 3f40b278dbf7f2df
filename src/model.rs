//! Decision variables and hard constraints.
//!
//! `assign[i][j]` is 1 when unit i occupies period j. A [`Formulation`] holds
//! the variables and constraints of one model before a solver is attached, so
//! the feasibility phase and the full model can be built independently.

use crate::config::{PenaltyFamily, PenaltyWeights};
use crate::penalties;
use crate::problem::IndexedProblem;
use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable};
use log::{debug, info, trace};

/// A penalty variable and the weight it carries in the objective.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyTerm {
    pub family: PenaltyFamily,
    pub weight: f64,
    pub var: Variable,
}

pub struct Formulation {
    pub vars: ProblemVariables,
    pub assign: Vec<Vec<Variable>>,
    /// `teacher_busy[t][j]` mirrors whether teacher t teaches in period j.
    /// Only the full model carries these.
    pub teacher_busy: Vec<Vec<Variable>>,
    pub constraints: Vec<Constraint>,
    pub penalties: Vec<PenaltyTerm>,
    pub objective: Expression,
}

impl Formulation {
    fn with_assignment_vars(index: &IndexedProblem<'_>) -> Self {
        let mut vars = ProblemVariables::new();
        let assign = (0..index.num_units())
            .map(|_| vars.add_vector(variable().binary(), index.num_periods()))
            .collect();
        Self {
            vars,
            assign,
            teacher_busy: Vec::new(),
            constraints: Vec::new(),
            penalties: Vec::new(),
            objective: Expression::from(0.0),
        }
    }

    /// Hard constraints only, over a fresh set of assignment variables.
    pub fn feasibility(index: &IndexedProblem<'_>) -> Self {
        let mut formulation = Self::with_assignment_vars(index);
        formulation.add_hard_constraints(index);
        info!(
            "Feasibility model: {} assignment variables, {} constraints.",
            index.num_units() * index.num_periods(),
            formulation.constraints.len()
        );
        formulation
    }

    /// Hard constraints, penalty families and the weighted objective.
    pub fn full(index: &IndexedProblem<'_>, weights: &PenaltyWeights) -> Self {
        let mut formulation = Self::with_assignment_vars(index);
        formulation.add_teacher_busy_vars(index);
        formulation.add_hard_constraints(index);
        penalties::add_penalties(&mut formulation, index, weights);
        formulation.objective = formulation
            .penalties
            .iter()
            .map(|term| term.weight * Expression::from(term.var))
            .sum();
        info!(
            "Full model: {} assignment variables, {} penalty families, {} constraints.",
            index.num_units() * index.num_periods(),
            formulation.penalties.len(),
            formulation.constraints.len()
        );
        formulation
    }

    /// Sum of `assign[i][j]` over the given units in period j.
    pub fn occupancy(&self, units: &[usize], j: usize) -> Expression {
        units.iter().map(|&i| self.assign[i][j]).sum()
    }

    fn add_teacher_busy_vars(&mut self, index: &IndexedProblem<'_>) {
        for units in &index.teacher_units {
            let busy = self.vars.add_vector(variable().binary(), index.num_periods());
            for (j, &var) in busy.iter().enumerate() {
                let load = self.occupancy(units, j);
                self.constraints.push(constraint!(var == load));
            }
            self.teacher_busy.push(busy);
        }
    }

    pub fn add_hard_constraints(&mut self, index: &IndexedProblem<'_>) {
        let before = self.constraints.len();

        // every unit gets exactly one period
        for row in &self.assign {
            let scheduled_once: Expression = row.iter().copied().sum();
            self.constraints.push(constraint!(scheduled_once == 1));
        }
        trace!("  exactly one period: {} constraints", self.constraints.len() - before);

        // breaks and unavailable teachers
        let mark = self.constraints.len();
        for (i, row) in index.allowed.iter().enumerate() {
            for (j, &ok) in row.iter().enumerate() {
                if !ok {
                    let var = self.assign[i][j];
                    self.constraints.push(constraint!(var == 0));
                }
            }
        }
        trace!("  forbidden periods: {} constraints", self.constraints.len() - mark);

        // one unit per period, globally
        let mark = self.constraints.len();
        let all_units: Vec<usize> = (0..index.num_units()).collect();
        if all_units.len() > 1 {
            for j in 0..index.num_periods() {
                let occupied = self.occupancy(&all_units, j);
                self.constraints.push(constraint!(occupied <= 1));
            }
        }
        trace!("  single occupancy: {} constraints", self.constraints.len() - mark);

        // no teacher overlap
        let mark = self.constraints.len();
        for units in index.teacher_units.iter().filter(|u| u.len() > 1) {
            for j in 0..index.num_periods() {
                let teacher_busy = self.occupancy(units, j);
                self.constraints.push(constraint!(teacher_busy <= 1));
            }
        }
        trace!("  teacher exclusivity: {} constraints", self.constraints.len() - mark);

        // no class group overlap
        let mark = self.constraints.len();
        for units in index.group_units.iter().filter(|u| u.len() > 1) {
            for j in 0..index.num_periods() {
                let class_busy = self.occupancy(units, j);
                self.constraints.push(constraint!(class_busy <= 1));
            }
        }
        trace!("  class group exclusivity: {} constraints", self.constraints.len() - mark);

        // teacher workload per day and per week, one period counting as one hour
        let mark = self.constraints.len();
        for (t, units) in index.teacher_units.iter().enumerate() {
            let teacher = &index.problem.teachers()[t];
            if units.len() as u32 > teacher.max_hours_per_week {
                let weekly: Expression = units
                    .iter()
                    .flat_map(|&i| self.assign[i].iter().copied())
                    .sum();
                let cap = f64::from(teacher.max_hours_per_week);
                self.constraints.push(constraint!(weekly <= cap));
            }
            if units.len() as u32 > teacher.max_hours_per_day {
                for layout in &index.days {
                    let daily: Expression = layout
                        .periods
                        .iter()
                        .map(|&j| self.occupancy(units, j))
                        .sum();
                    let cap = f64::from(teacher.max_hours_per_day);
                    self.constraints.push(constraint!(daily <= cap));
                }
            }
        }
        trace!("  teacher workload: {} constraints", self.constraints.len() - mark);

        // locked assignments stay where they are
        let mark = self.constraints.len();
        for &(i, j, _) in &index.pins {
            let var = self.assign[i][j];
            self.constraints.push(constraint!(var == 1));
        }
        trace!("  locked pins: {} constraints", self.constraints.len() - mark);

        debug!("Added {} hard constraints.", self.constraints.len() - before);
    }
}
