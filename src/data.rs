use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// Type aliases for clarity
pub type UnitId = u32;
pub type PeriodId = u32;
pub type TeacherId = u32;
pub type ClassGroupId = u32;
pub type CourseId = u32;
pub type RoomId = u32;
pub type WeekPatternId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[default]
    Regular,
    Lab,
    Physical,
    Art,
    Special,
}

/// Identifies a period by weekday and start time, independent of its id.
/// Teacher preferences and unavailability are expressed in these keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodKey {
    pub day: Weekday,
    /// Minutes since midnight.
    pub start_minute: u16,
}

impl PeriodKey {
    pub fn new(day: Weekday, hour: u16, minute: u16) -> Self {
        Self {
            day,
            start_minute: hour * 60 + minute,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{:02}:{:02}",
            self.day,
            self.start_minute / 60,
            self.start_minute % 60
        )
    }
}

/// One weekly teaching obligation that needs a period.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingUnit {
    pub id: UnitId,
    pub course_id: CourseId,
    pub class_group_id: ClassGroupId,
    pub teacher_id: TeacherId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default = "default_weekly_hours")]
    pub weekly_hours: u32,
    #[serde(default)]
    pub period_type: PeriodType,
    #[serde(default)]
    pub is_locked: bool,
}

fn default_weekly_hours() -> u32 {
    1
}

impl TeachingUnit {
    pub fn new(
        id: UnitId,
        course_id: CourseId,
        class_group_id: ClassGroupId,
        teacher_id: TeacherId,
    ) -> Self {
        Self {
            id,
            course_id,
            class_group_id,
            teacher_id,
            room_id: None,
            weekly_hours: 1,
            period_type: PeriodType::Regular,
            is_locked: false,
        }
    }

    /// Units spanning several weekly hours want to sit next to a partner unit
    /// of the same course and class group.
    pub fn needs_consecutive(&self) -> bool {
        self.weekly_hours >= 2
    }

    pub fn is_partner_of(&self, other: &TeachingUnit) -> bool {
        self.id != other.id
            && self.course_id == other.course_id
            && self.class_group_id == other.class_group_id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    pub id: PeriodId,
    pub day: Weekday,
    pub start_minute: u16,
    pub end_minute: u16,
    pub period_number: u32,
    #[serde(default)]
    pub is_break: bool,
}

impl TimePeriod {
    pub fn key(&self) -> PeriodKey {
        PeriodKey {
            day: self.day,
            start_minute: self.start_minute,
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.key(), self.id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default = "default_max_hours_per_day")]
    pub max_hours_per_day: u32,
    #[serde(default = "default_max_hours_per_week")]
    pub max_hours_per_week: u32,
    #[serde(default)]
    pub preferred_periods: HashSet<PeriodKey>,
    #[serde(default)]
    pub unavailable_periods: HashSet<PeriodKey>,
}

fn default_max_hours_per_day() -> u32 {
    8
}

fn default_max_hours_per_week() -> u32 {
    40
}

impl Teacher {
    pub fn new(id: TeacherId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            max_hours_per_day: default_max_hours_per_day(),
            max_hours_per_week: default_max_hours_per_week(),
            preferred_periods: HashSet::new(),
            unavailable_periods: HashSet::new(),
        }
    }

    /// A period is dispreferred only when the teacher stated any preference at all.
    pub fn dislikes(&self, key: &PeriodKey) -> bool {
        !self.preferred_periods.is_empty() && !self.preferred_periods.contains(key)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: ClassGroupId,
    pub name: String,
    pub student_count: u32,
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

/// A named rule; for soft rules the weight scales the matching penalty family.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedConstraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub weight: f64,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl WeightedConstraint {
    pub fn soft(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Soft,
            weight,
            parameters: serde_json::Map::new(),
            is_active: true,
        }
    }

    pub fn hard(name: impl Into<String>) -> Self {
        Self {
            kind: ConstraintKind::Hard,
            ..Self::soft(name, 1.0)
        }
    }
}

/// A previously committed placement. Locked ones are pinned, the rest re-solved.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAssignment {
    pub unit_id: UnitId,
    pub period_id: PeriodId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub is_locked: bool,
}

/// Represents a single scheduled unit; the engine's only output record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub tenant_id: String,
    pub unit_id: UnitId,
    pub period_id: PeriodId,
    pub room_id: Option<RoomId>,
    pub week_pattern_id: Option<WeekPatternId>,
    pub is_locked: bool,
}

/// Every collection one solve consumes, as loaded from JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInput {
    pub tenant_id: String,
    #[serde(default)]
    pub units: Vec<TeachingUnit>,
    #[serde(default)]
    pub periods: Vec<TimePeriod>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub class_groups: Vec<ClassGroup>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub constraints: Vec<WeightedConstraint>,
    #[serde(default)]
    pub existing_assignments: Vec<ExistingAssignment>,
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_key_formats_like_day_and_clock() {
        assert_eq!(PeriodKey::new(Weekday::Monday, 9, 0).to_string(), "monday_09:00");
        assert_eq!(PeriodKey::new(Weekday::Friday, 14, 5).to_string(), "friday_14:05");
    }

    #[test]
    fn teacher_without_preferences_dislikes_nothing() {
        let mut teacher = Teacher::new(1, "Zhang");
        let key = PeriodKey::new(Weekday::Tuesday, 10, 0);
        assert!(!teacher.dislikes(&key));

        teacher.preferred_periods.insert(PeriodKey::new(Weekday::Monday, 9, 0));
        assert!(teacher.dislikes(&key));
        assert!(!teacher.dislikes(&PeriodKey::new(Weekday::Monday, 9, 0)));
    }

    #[test]
    fn partners_share_course_and_class_group() {
        let a = TeachingUnit::new(1, 10, 100, 7);
        let b = TeachingUnit::new(2, 10, 100, 8);
        let c = TeachingUnit::new(3, 11, 100, 7);
        assert!(a.is_partner_of(&b));
        assert!(!a.is_partner_of(&a));
        assert!(!a.is_partner_of(&c));
    }

    #[test]
    fn unit_defaults_apply_when_deserializing() {
        let unit: TeachingUnit = serde_json::from_str(
            r#"{"id": 4, "courseId": 1, "classGroupId": 2, "teacherId": 3}"#,
        )
        .unwrap();
        assert_eq!(unit.weekly_hours, 1);
        assert_eq!(unit.room_id, None);
        assert_eq!(unit.period_type, PeriodType::Regular);
        assert!(!unit.needs_consecutive());
    }
}
