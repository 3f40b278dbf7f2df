use crate::data::{ClassGroup, PeriodKey, Room, Teacher, TeachingUnit, TimePeriod, Weekday};
use crate::problem::Problem;
use log::info;

const DAYS: [Weekday; 5] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
];
const HOURS: [u16; 6] = [9, 10, 11, 14, 15, 16];

/// Three teachers, two class groups and three courses over a five-day week
/// of six hourly periods. Courses 1 and 2 meet three times a week per group,
/// course 3 twice, giving sixteen single-hour units.
pub fn sample_problem(tenant_id: &str) -> Problem {
    let mut problem = Problem::new(tenant_id);

    let teachers = [
        (1, "Zhang", 20, [(Weekday::Monday, 9), (Weekday::Tuesday, 9), (Weekday::Wednesday, 9)]),
        (2, "Li", 18, [(Weekday::Tuesday, 14), (Weekday::Thursday, 14), (Weekday::Friday, 14)]),
        (3, "Wang", 16, [(Weekday::Monday, 14), (Weekday::Wednesday, 14), (Weekday::Friday, 9)]),
    ];
    for (id, name, max_week, preferred) in teachers {
        let mut teacher = Teacher::new(id, name);
        teacher.max_hours_per_week = max_week;
        teacher.preferred_periods = preferred
            .into_iter()
            .map(|(day, hour)| PeriodKey::new(day, hour, 0))
            .collect();
        problem.add_teacher(teacher);
    }

    let mut period_id = 1;
    for day in DAYS {
        for (slot, hour) in HOURS.into_iter().enumerate() {
            problem.add_period(TimePeriod {
                id: period_id,
                day,
                start_minute: hour * 60,
                end_minute: (hour + 1) * 60,
                period_number: slot as u32 + 1,
                is_break: false,
            });
            period_id += 1;
        }
    }

    for (id, name, student_count) in [(1, "Grade 1 A", 30), (2, "Grade 1 B", 28)] {
        problem.add_class_group(ClassGroup {
            id,
            name: name.to_string(),
            student_count,
        });
    }

    for (id, name, capacity) in [(1, "Room 101", 32), (2, "Hall", 60)] {
        problem.add_room(Room {
            id,
            name: name.to_string(),
            capacity,
            features: Vec::new(),
        });
    }

    let courses = [(1, 3), (2, 3), (3, 2)];
    let mut unit_id = 1;
    for group_id in [1, 2] {
        for (course_id, sessions) in courses {
            for _ in 0..sessions {
                let teacher_id = (unit_id - 1) % teachers.len() as u32 + 1;
                problem.add_unit(TeachingUnit::new(unit_id, course_id, group_id, teacher_id));
                unit_id += 1;
            }
        }
    }

    info!(
        "Sample problem: {} teachers, {} units, {} periods.",
        problem.teachers().len(),
        problem.units().len(),
        problem.periods().len()
    );
    problem
}
