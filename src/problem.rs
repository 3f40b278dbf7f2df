//! Problem assembly and dense indexing for one solve.
//!
//! A [`Problem`] collects the entities of a single solve, de-duplicated by id.
//! [`Problem::index`] resolves every cross reference into small integer
//! indices; a reference to an entity that was never added fails there.

use crate::data::{
    ClassGroup, ClassGroupId, ExistingAssignment, PeriodId, ProblemInput, Room, RoomId, Teacher,
    TeacherId, TeachingUnit, TimePeriod, UnitId, WeightedConstraint, Weekday,
};
use crate::error::{EngineError, Result};
use itertools::Itertools;
use log::trace;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Problem {
    tenant_id: String,
    units: Vec<TeachingUnit>,
    periods: Vec<TimePeriod>,
    teachers: Vec<Teacher>,
    class_groups: Vec<ClassGroup>,
    rooms: Vec<Room>,
    constraints: Vec<WeightedConstraint>,
    existing_assignments: Vec<ExistingAssignment>,

    unit_to_idx: HashMap<UnitId, usize>,
    period_to_idx: HashMap<PeriodId, usize>,
    teacher_to_idx: HashMap<TeacherId, usize>,
    class_group_to_idx: HashMap<ClassGroupId, usize>,
    room_to_idx: HashMap<RoomId, usize>,
}

impl Problem {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            units: Vec::new(),
            periods: Vec::new(),
            teachers: Vec::new(),
            class_groups: Vec::new(),
            rooms: Vec::new(),
            constraints: Vec::new(),
            existing_assignments: Vec::new(),
            unit_to_idx: HashMap::new(),
            period_to_idx: HashMap::new(),
            teacher_to_idx: HashMap::new(),
            class_group_to_idx: HashMap::new(),
            room_to_idx: HashMap::new(),
        }
    }

    pub fn from_input(input: ProblemInput) -> Self {
        let mut problem = Self::new(input.tenant_id);
        input.teachers.into_iter().for_each(|t| problem.add_teacher(t));
        input.periods.into_iter().for_each(|p| problem.add_period(p));
        input.class_groups.into_iter().for_each(|g| problem.add_class_group(g));
        input.rooms.into_iter().for_each(|r| problem.add_room(r));
        input.units.into_iter().for_each(|u| problem.add_unit(u));
        input.constraints.into_iter().for_each(|c| problem.add_constraint(c));
        input
            .existing_assignments
            .into_iter()
            .for_each(|a| problem.add_existing_assignment(a));
        problem
    }

    pub fn add_unit(&mut self, unit: TeachingUnit) {
        insert_unique(&mut self.units, &mut self.unit_to_idx, unit.id, unit);
    }

    pub fn add_period(&mut self, period: TimePeriod) {
        insert_unique(&mut self.periods, &mut self.period_to_idx, period.id, period);
    }

    pub fn add_teacher(&mut self, teacher: Teacher) {
        insert_unique(&mut self.teachers, &mut self.teacher_to_idx, teacher.id, teacher);
    }

    pub fn add_class_group(&mut self, group: ClassGroup) {
        insert_unique(&mut self.class_groups, &mut self.class_group_to_idx, group.id, group);
    }

    pub fn add_room(&mut self, room: Room) {
        insert_unique(&mut self.rooms, &mut self.room_to_idx, room.id, room);
    }

    /// Constraints are identified by name.
    pub fn add_constraint(&mut self, constraint: WeightedConstraint) {
        if !self.constraints.iter().any(|c| c.name == constraint.name) {
            self.constraints.push(constraint);
        }
    }

    /// Existing assignments are identified by their (unit, period) pair.
    pub fn add_existing_assignment(&mut self, assignment: ExistingAssignment) {
        let duplicate = self
            .existing_assignments
            .iter()
            .any(|a| a.unit_id == assignment.unit_id && a.period_id == assignment.period_id);
        if !duplicate {
            self.existing_assignments.push(assignment);
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn units(&self) -> &[TeachingUnit] {
        &self.units
    }

    pub fn periods(&self) -> &[TimePeriod] {
        &self.periods
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    pub fn class_groups(&self) -> &[ClassGroup] {
        &self.class_groups
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn constraints(&self) -> &[WeightedConstraint] {
        &self.constraints
    }

    pub fn existing_assignments(&self) -> &[ExistingAssignment] {
        &self.existing_assignments
    }

    pub fn unit_index(&self, id: UnitId) -> Result<usize> {
        self.unit_to_idx.get(&id).copied().ok_or(EngineError::UnknownUnit(id))
    }

    pub fn period_index(&self, id: PeriodId) -> Result<usize> {
        self.period_to_idx.get(&id).copied().ok_or(EngineError::UnknownPeriod(id))
    }

    pub fn teacher_index(&self, id: TeacherId) -> Result<usize> {
        self.teacher_to_idx.get(&id).copied().ok_or(EngineError::UnknownTeacher(id))
    }

    pub fn room(&self, id: RoomId) -> Result<&Room> {
        self.room_to_idx
            .get(&id)
            .map(|&idx| &self.rooms[idx])
            .ok_or(EngineError::UnknownRoom(id))
    }

    pub fn class_group(&self, id: ClassGroupId) -> Option<&ClassGroup> {
        self.class_group_to_idx.get(&id).map(|&idx| &self.class_groups[idx])
    }

    /// Resolves every reference into dense index tables.
    pub fn index(&self) -> Result<IndexedProblem<'_>> {
        IndexedProblem::build(self)
    }
}

fn insert_unique<K: std::hash::Hash + Eq, T>(
    items: &mut Vec<T>,
    index: &mut HashMap<K, usize>,
    key: K,
    item: T,
) {
    if let std::collections::hash_map::Entry::Vacant(slot) = index.entry(key) {
        slot.insert(items.len());
        items.push(item);
    }
}

/// The usable (non-break) periods of one weekday, sorted by start time.
#[derive(Debug, Clone)]
pub struct DayLayout {
    pub day: Weekday,
    pub periods: Vec<usize>,
}

/// Dense, validated view of a [`Problem`].
///
/// Units, periods and teachers are addressed by their position in the
/// problem's vectors; class groups get their own dense numbering in order of
/// first appearance among the units.
#[derive(Debug)]
pub struct IndexedProblem<'a> {
    pub problem: &'a Problem,
    pub unit_teacher: Vec<usize>,
    pub teacher_units: Vec<Vec<usize>>,
    pub group_ids: Vec<ClassGroupId>,
    pub group_units: Vec<Vec<usize>>,
    /// `allowed[i][j]`: unit i may occupy period j (not a break, teacher available).
    pub allowed: Vec<Vec<bool>>,
    /// Locked (unit, period, room) pins.
    pub pins: Vec<(usize, usize, Option<RoomId>)>,
    pub days: Vec<DayLayout>,
    /// Day layout index of each period; `None` for breaks.
    pub period_day: Vec<Option<usize>>,
    /// Periods directly before or after each period on the same day.
    pub neighbours: Vec<Vec<usize>>,
    /// Grouping partners for units that need consecutive hours; empty otherwise.
    pub partners: Vec<Vec<usize>>,
    /// Room each unit lands in when extracted; a locked room wins over the fit.
    pub unit_room: Vec<Option<RoomId>>,
}

impl<'a> IndexedProblem<'a> {
    fn build(problem: &'a Problem) -> Result<Self> {
        let num_units = problem.units.len();
        let num_periods = problem.periods.len();

        let unit_teacher = problem
            .units
            .iter()
            .map(|u| problem.teacher_index(u.teacher_id))
            .collect::<Result<Vec<_>>>()?;

        let mut teacher_units = vec![Vec::new(); problem.teachers.len()];
        for (i, &t) in unit_teacher.iter().enumerate() {
            teacher_units[t].push(i);
        }

        let mut group_ids = Vec::new();
        let mut group_units: Vec<Vec<usize>> = Vec::new();
        let mut group_to_idx: HashMap<ClassGroupId, usize> = HashMap::new();
        for (i, unit) in problem.units.iter().enumerate() {
            let g = *group_to_idx.entry(unit.class_group_id).or_insert_with(|| {
                group_ids.push(unit.class_group_id);
                group_units.push(Vec::new());
                group_ids.len() - 1
            });
            group_units[g].push(i);
        }

        let allowed = unit_teacher
            .iter()
            .map(|&t| {
                let teacher = &problem.teachers[t];
                problem
                    .periods
                    .iter()
                    .map(|p| !p.is_break && !teacher.unavailable_periods.contains(&p.key()))
                    .collect()
            })
            .collect();

        let mut pins = Vec::new();
        for assignment in problem.existing_assignments.iter().filter(|a| a.is_locked) {
            let i = problem.unit_index(assignment.unit_id)?;
            let j = problem.period_index(assignment.period_id)?;
            if let Some(room_id) = assignment.room_id {
                problem.room(room_id)?;
            }
            pins.push((i, j, assignment.room_id));
        }

        let days: Vec<DayLayout> = problem
            .periods
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_break)
            .sorted_by_key(|(j, p)| (p.day, p.start_minute, p.period_number, *j))
            .chunk_by(|(_, p)| p.day)
            .into_iter()
            .map(|(day, group)| DayLayout {
                day,
                periods: group.map(|(j, _)| j).collect(),
            })
            .collect();

        let mut period_day = vec![None; num_periods];
        let mut neighbours = vec![Vec::new(); num_periods];
        for (d, layout) in days.iter().enumerate() {
            for &j in &layout.periods {
                period_day[j] = Some(d);
            }
            for (&a, &b) in layout.periods.iter().tuple_windows() {
                neighbours[a].push(b);
                neighbours[b].push(a);
            }
        }

        let partners = problem
            .units
            .iter()
            .map(|unit| {
                if !unit.needs_consecutive() {
                    return Vec::new();
                }
                problem
                    .units
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| unit.is_partner_of(other))
                    .map(|(k, _)| k)
                    .collect()
            })
            .collect();

        let mut unit_room = problem
            .units
            .iter()
            .map(|unit| resolve_room(problem, unit))
            .collect::<Result<Vec<_>>>()?;
        for &(i, _, room) in &pins {
            if room.is_some() {
                unit_room[i] = room;
            }
        }

        trace!(
            "Indexed {} units, {} periods ({} days), {} teachers, {} class groups, {} pins.",
            num_units,
            num_periods,
            days.len(),
            problem.teachers.len(),
            group_ids.len(),
            pins.len()
        );

        Ok(Self {
            problem,
            unit_teacher,
            teacher_units,
            group_ids,
            group_units,
            allowed,
            pins,
            days,
            period_day,
            neighbours,
            partners,
            unit_room,
        })
    }

    pub fn num_units(&self) -> usize {
        self.problem.units.len()
    }

    pub fn num_periods(&self) -> usize {
        self.problem.periods.len()
    }

    pub fn num_days(&self) -> usize {
        self.days.len()
    }

    pub fn teacher_of(&self, unit: usize) -> &Teacher {
        &self.problem.teachers[self.unit_teacher[unit]]
    }

    /// Room waste (capacity minus class size) of each unit; zero when unknown.
    pub fn room_waste(&self) -> Vec<u32> {
        self.problem
            .units
            .iter()
            .zip(&self.unit_room)
            .map(|(unit, room)| {
                let size = self.problem.class_group(unit.class_group_id).map(|g| g.student_count);
                let capacity = room.and_then(|id| self.problem.room(id).ok()).map(|r| r.capacity);
                match (size, capacity) {
                    (Some(size), Some(capacity)) => capacity.saturating_sub(size),
                    _ => 0,
                }
            })
            .collect()
    }

    /// Detects infeasibility that needs no solver to prove.
    pub fn screen(&self) -> Option<String> {
        let usable = self.period_day.iter().filter(|d| d.is_some()).count();
        if self.num_units() > usable {
            return Some(format!(
                "{} units cannot fit into {} usable periods",
                self.num_units(),
                usable
            ));
        }
        for (i, row) in self.allowed.iter().enumerate() {
            if !row.iter().any(|&ok| ok) {
                return Some(format!("unit {} has no usable period", self.problem.units[i].id));
            }
        }
        let mut pinned_periods: HashMap<usize, usize> = HashMap::new();
        let mut pinned_units: HashMap<usize, usize> = HashMap::new();
        for &(i, j, _) in &self.pins {
            if !self.allowed[i][j] {
                return Some(format!(
                    "unit {} is locked to unusable period {}",
                    self.problem.units[i].id, self.problem.periods[j].id
                ));
            }
            if let Some(&other) = pinned_periods.get(&j) {
                if other != i {
                    return Some(format!(
                        "units {} and {} are both locked to period {}",
                        self.problem.units[other].id,
                        self.problem.units[i].id,
                        self.problem.periods[j].id
                    ));
                }
            }
            if let Some(&other) = pinned_units.get(&i) {
                if other != j {
                    return Some(format!(
                        "unit {} is locked to two periods",
                        self.problem.units[i].id
                    ));
                }
            }
            pinned_periods.insert(j, i);
            pinned_units.insert(i, j);
        }
        None
    }
}

/// Fixed room first, otherwise the tightest room that holds the class,
/// otherwise the largest room.
fn resolve_room(problem: &Problem, unit: &TeachingUnit) -> Result<Option<RoomId>> {
    if let Some(room_id) = unit.room_id {
        return problem.room(room_id).map(|r| Some(r.id));
    }
    let size = problem
        .class_group(unit.class_group_id)
        .map(|g| g.student_count)
        .unwrap_or(0);
    let best_fit = problem
        .rooms
        .iter()
        .filter(|r| r.capacity >= size)
        .min_by_key(|r| (r.capacity, r.id));
    let fallback = || problem.rooms.iter().max_by_key(|r| (r.capacity, std::cmp::Reverse(r.id)));
    Ok(best_fit.or_else(fallback).map(|r| r.id))
}
