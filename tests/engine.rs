use std::time::Duration;
use timetable_solver::data::{
    Assignment, ClassGroup, ExistingAssignment, PeriodKey, ProblemInput, Room, Teacher,
    TeachingUnit, TimePeriod, WeightedConstraint, Weekday,
};
use timetable_solver::sample::sample_problem;
use timetable_solver::validation::{locked_violations, validate_hard_constraints};
use timetable_solver::{Engine, EngineConfig, PenaltyFamily, PhaseConfig, Problem, SolveStatus};

const SHORT: Duration = Duration::from_secs(10);

fn is_valid(assignments: &[Assignment], problem: &Problem) -> bool {
    validate_hard_constraints(assignments, problem.units(), problem.periods()).is_empty()
}

fn engine() -> Engine {
    let config = EngineConfig {
        phase1: PhaseConfig::new(Duration::from_secs(10), 1),
        phase2: PhaseConfig::new(Duration::from_secs(20), 1),
        ..EngineConfig::default()
    };
    Engine::new(config).unwrap()
}

fn monday(id: u32, hour: u16) -> TimePeriod {
    TimePeriod {
        id,
        day: Weekday::Monday,
        start_minute: hour * 60,
        end_minute: hour * 60 + 45,
        period_number: id,
        is_break: false,
    }
}

/// `units` single-hour units, each with its own teacher and class group.
fn independent_units(units: u32, periods: u32) -> Problem {
    let mut problem = Problem::new("school");
    for id in 1..=units {
        problem.add_teacher(Teacher::new(id, format!("T{id}")));
        problem.add_class_group(ClassGroup {
            id,
            name: format!("G{id}"),
            student_count: 20,
        });
        problem.add_unit(TeachingUnit::new(id, id, id, id));
    }
    for id in 1..=periods {
        problem.add_period(monday(id, 7 + id as u16));
    }
    problem
}

#[test]
fn feasible_problem_places_every_unit() {
    let problem = independent_units(3, 5);
    let outcome = engine().solve(&problem, SHORT).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.assignments.len(), 3);
    assert_eq!(outcome.quality.business.scheduling_rate, 1.0);
    assert!(is_valid(&outcome.assignments, &problem));
    assert!(outcome.assignments.iter().all(|a| a.tenant_id == "school"));
}

#[test]
fn shared_teacher_with_one_period_is_infeasible() {
    let mut problem = Problem::new("school");
    problem.add_teacher(Teacher::new(1, "Only"));
    problem.add_period(monday(1, 9));
    problem.add_unit(TeachingUnit::new(1, 1, 1, 1));
    problem.add_unit(TeachingUnit::new(2, 2, 2, 1));

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(!outcome.success);
    assert!(outcome.assignments.is_empty());
    assert_eq!(outcome.quality.telemetry.status, SolveStatus::Infeasible);
}

#[test]
fn more_units_than_periods_is_infeasible() {
    let outcome = engine()
        .solve_two_phase(&independent_units(4, 3), SHORT, SHORT)
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.assignments.is_empty());
}

#[test]
fn teacher_clash_is_solved_by_the_model() {
    // one teacher, two units, two periods: only the solver separates them
    let mut problem = Problem::new("school");
    problem.add_teacher(Teacher::new(1, "Busy"));
    problem.add_period(monday(1, 9));
    problem.add_period(monday(2, 10));
    problem.add_unit(TeachingUnit::new(1, 1, 1, 1));
    problem.add_unit(TeachingUnit::new(2, 2, 2, 1));

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);
    assert_ne!(outcome.assignments[0].period_id, outcome.assignments[1].period_id);
}

#[test]
fn locked_assignment_is_preserved() {
    let mut problem = independent_units(3, 4);
    problem.add_existing_assignment(ExistingAssignment {
        unit_id: 1,
        period_id: 3,
        room_id: None,
        is_locked: true,
    });

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);

    let pinned = outcome.assignments.iter().find(|a| a.unit_id == 1).unwrap();
    assert_eq!(pinned.period_id, 3);
    assert!(pinned.is_locked);
    assert!(outcome.assignments.iter().filter(|a| a.unit_id != 1).all(|a| !a.is_locked));
    assert!(locked_violations(&outcome.assignments, problem.existing_assignments()).is_empty());
    assert!(is_valid(&outcome.assignments, &problem));
}

#[test]
fn unavailable_period_is_avoided() {
    let mut problem = Problem::new("school");
    let mut teacher = Teacher::new(1, "Morning off");
    teacher.unavailable_periods.insert(PeriodKey::new(Weekday::Monday, 9, 0));
    problem.add_teacher(teacher);
    problem.add_period(monday(1, 9));
    problem.add_period(monday(2, 10));
    problem.add_unit(TeachingUnit::new(1, 1, 1, 1));

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.assignments[0].period_id, 2);
}

#[test]
fn preferred_period_is_chosen() {
    let mut problem = Problem::new("school");
    let mut teacher = Teacher::new(1, "Late riser");
    teacher.preferred_periods.insert(PeriodKey::new(Weekday::Monday, 11, 0));
    problem.add_teacher(teacher);
    for (id, hour) in [(1, 9), (2, 10), (3, 11)] {
        problem.add_period(monday(id, hour));
    }
    problem.add_unit(TeachingUnit::new(1, 1, 1, 1));

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.assignments[0].period_id, 3);
    let report = &outcome.quality.violations;
    assert_eq!(report.family(PenaltyFamily::TeacherPreference).unwrap().violations, 0);
}

#[test]
fn rooms_are_resolved_by_fit() {
    let mut problem = independent_units(2, 2);
    problem.add_room(Room {
        id: 7,
        name: "Small".into(),
        capacity: 25,
        features: Vec::new(),
    });
    problem.add_room(Room {
        id: 8,
        name: "Large".into(),
        capacity: 200,
        features: Vec::new(),
    });

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);
    assert!(outcome.assignments.iter().all(|a| a.room_id == Some(7)));
}

#[test]
fn two_phase_is_repeatable_and_valid() {
    let problem = sample_problem("demo");
    let engine = engine();
    for _ in 0..2 {
        let outcome = engine.solve_two_phase_default(&problem).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.assignments.len(), problem.units().len());
        assert!(outcome.metrics.phase1_status.has_solution());
        assert!(outcome.metrics.hint_applied);
        assert!(!outcome.metrics.used_fallback);
        assert!(is_valid(&outcome.assignments, &problem));
    }
}

#[test]
fn objective_matches_the_recomputed_penalty() {
    let problem = sample_problem("demo");
    let outcome = engine().solve(&problem, Duration::from_secs(30)).unwrap();
    assert!(outcome.success);

    let objective = outcome.quality.telemetry.objective_value.unwrap();
    let report = &outcome.quality.violations;
    assert!((objective - report.total_penalty).abs() < 1e-4);

    let evaluated = engine().evaluate(&problem, &outcome.assignments).unwrap();
    assert!((evaluated.total_penalty - report.total_penalty).abs() < 1e-9);
}

#[test]
fn unknown_teacher_is_an_error() {
    let mut problem = Problem::new("school");
    problem.add_period(monday(1, 9));
    problem.add_unit(TeachingUnit::new(1, 1, 1, 42));
    assert!(engine().solve(&problem, SHORT).is_err());
}

#[test]
fn validator_flags_a_tampered_schedule() {
    let problem = independent_units(3, 5);
    let mut assignments = engine().solve(&problem, SHORT).unwrap().assignments;
    let first = assignments[0].period_id;
    assignments[1].period_id = first;

    let violations = validate_hard_constraints(&assignments, problem.units(), problem.periods());
    assert_eq!(violations.len(), 1);
    assert!(violations[0].contains("2 units"));
}

#[test]
fn json_input_solves_with_constraint_weights() {
    let input: ProblemInput = serde_json::from_str(
        r#"{
            "tenantId": "json-school",
            "teachers": [{ "id": 1, "name": "A" }],
            "classGroups": [{ "id": 1, "name": "1A", "studentCount": 25 }],
            "periods": [
                { "id": 1, "day": "monday", "startMinute": 540, "endMinute": 585,
                  "periodNumber": 1 },
                { "id": 2, "day": "monday", "startMinute": 600, "endMinute": 645,
                  "periodNumber": 2, "isBreak": true },
                { "id": 3, "day": "monday", "startMinute": 660, "endMinute": 705,
                  "periodNumber": 3 }
            ],
            "units": [
                { "id": 1, "courseId": 1, "classGroupId": 1, "teacherId": 1 },
                { "id": 2, "courseId": 2, "classGroupId": 1, "teacherId": 1 }
            ],
            "constraints": [
                { "name": "compact_schedule", "kind": "SOFT", "weight": 0.2 },
                { "name": "teacher_conflict", "kind": "HARD", "weight": 1.0 }
            ]
        }"#,
    )
    .unwrap();
    let problem = Problem::from_input(input);
    assert_eq!(problem.constraints().len(), 2);

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);
    let mut periods: Vec<_> = outcome.assignments.iter().map(|a| a.period_id).collect();
    periods.sort();
    assert_eq!(periods, vec![1, 3]);

    let compact = outcome.quality.violations.family(PenaltyFamily::CompactSchedule).unwrap();
    assert_eq!(compact.weight, 0.2);
}

#[test]
fn unbounded_time_limit_is_accepted() {
    let problem = independent_units(2, 3);
    let outcome = engine().solve(&problem, Duration::MAX).unwrap();
    assert!(outcome.success);

    let two_phase = engine()
        .solve_two_phase(&problem, Duration::MAX, Duration::MAX)
        .unwrap();
    assert!(two_phase.success);
}

/// Teacher 1 can only teach in period 3 but has two units there.
fn availability_clash() -> Problem {
    let mut problem = Problem::new("school");
    let mut busy = Teacher::new(1, "Afternoons only");
    busy.unavailable_periods.insert(PeriodKey::new(Weekday::Monday, 9, 0));
    busy.unavailable_periods.insert(PeriodKey::new(Weekday::Monday, 10, 0));
    problem.add_teacher(busy);
    problem.add_teacher(Teacher::new(2, "Free"));
    for (id, hour) in [(1, 9), (2, 10), (3, 11)] {
        problem.add_period(monday(id, hour));
    }
    problem.add_unit(TeachingUnit::new(1, 1, 1, 1));
    problem.add_unit(TeachingUnit::new(2, 2, 2, 1));
    problem.add_unit(TeachingUnit::new(3, 3, 3, 2));
    problem
}

#[test]
fn solver_proves_availability_clash_infeasible() {
    let problem = availability_clash();
    assert_eq!(problem.index().unwrap().screen(), None);

    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(!outcome.success);
    assert!(outcome.assignments.is_empty());
    assert_eq!(outcome.quality.telemetry.status, SolveStatus::Infeasible);
}

#[test]
fn infeasible_first_phase_falls_back_to_the_full_model() {
    let outcome = engine()
        .solve_two_phase(&availability_clash(), SHORT, SHORT)
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.assignments.is_empty());
    assert_eq!(outcome.metrics.phase1_status, SolveStatus::Infeasible);
    assert!(outcome.metrics.used_fallback);
    assert!(!outcome.metrics.hint_applied);
    assert_eq!(outcome.metrics.phase2_status, Some(SolveStatus::Infeasible));
}

/// Two double-hour units of one course and class group; compactness is
/// switched off so only grouping decides where they go.
fn double_hour_pair(periods: &[(u32, Weekday, u16)]) -> Problem {
    let mut problem = Problem::new("school");
    problem.add_teacher(Teacher::new(1, "A"));
    for &(id, day, hour) in periods {
        problem.add_period(TimePeriod {
            id,
            day,
            start_minute: hour * 60,
            end_minute: hour * 60 + 45,
            period_number: u32::from(hour),
            is_break: false,
        });
    }
    for id in [1, 2] {
        let mut unit = TeachingUnit::new(id, 7, 1, 1);
        unit.weekly_hours = 2;
        problem.add_unit(unit);
    }
    problem.add_constraint(WeightedConstraint::soft("compact_schedule", 0.0));
    problem
}

#[test]
fn double_hour_units_land_next_to_each_other() {
    let problem = double_hour_pair(&[
        (1, Weekday::Monday, 9),
        (2, Weekday::Monday, 10),
        (3, Weekday::Monday, 11),
        (4, Weekday::Tuesday, 9),
    ]);
    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);

    let mut periods: Vec<_> = outcome.assignments.iter().map(|a| a.period_id).collect();
    periods.sort();
    assert!(periods == vec![1, 2] || periods == vec![2, 3], "got {periods:?}");

    let report = &outcome.quality.violations;
    assert_eq!(report.family(PenaltyFamily::ConsecutiveGrouping).unwrap().violations, 0);
    let objective = outcome.quality.telemetry.objective_value.unwrap();
    assert!((objective - report.total_penalty).abs() < 1e-4);
}

#[test]
fn separated_double_hour_units_are_charged_in_full() {
    let problem = double_hour_pair(&[(1, Weekday::Monday, 9), (2, Weekday::Tuesday, 9)]);
    let outcome = engine().solve(&problem, SHORT).unwrap();
    assert!(outcome.success);

    let report = &outcome.quality.violations;
    let grouping = report.family(PenaltyFamily::ConsecutiveGrouping).unwrap();
    assert_eq!(grouping.violations, 2);
    assert!((grouping.penalty - 0.8).abs() < 1e-9);
    let objective = outcome.quality.telemetry.objective_value.unwrap();
    assert!((objective - report.total_penalty).abs() < 1e-4);
    assert!((objective - 0.8).abs() < 1e-4);
}
