use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type CourseId = String;
pub type FacultyId = String;
pub type RoomId = String;
pub type StudentId = String;
/// Position in the slot domain, day-major.
pub type SlotIndex = usize;

/// Kind of a course meeting. Rooms carry the same tag to express what they are built for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
pub enum SessionKind {
    #[default]
    Lecture,
    Lab,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Lecture => f.write_str("Lecture"),
            SessionKind::Lab => f.write_str("Lab"),
        }
    }
}

fn one() -> u32 {
    1
}

/// Represents a course to be scheduled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    #[serde(default = "one")]
    pub lecture_count: u32,
    #[serde(default)]
    pub has_lab: bool,
    /// Only meaningful when `has_lab` is set.
    #[serde(default = "one")]
    pub lab_count: u32,
}

impl Course {
    /// Number of lab sessions this course expands into.
    pub fn lab_sessions(&self) -> u32 {
        if self.has_lab { self.lab_count } else { 0 }
    }
}

/// A member of the teaching staff.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
}

fn default_capacity() -> u32 {
    30
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default, rename = "type")]
    pub room_type: SessionKind,
}

/// A student and the courses they attend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    #[serde(default)]
    pub enrolled_courses: Vec<CourseId>,
}

/// Fixed faculty and/or room for the sessions of one course.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    #[serde(default)]
    pub id: Option<String>,
    pub course_id: CourseId,
    #[serde(default)]
    pub faculty_id: Option<FacultyId>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A teaching period within a day, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Period {
    pub start: u8,
    pub end: u8,
}

impl Period {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }
}

/// One schedulable (day, period) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeSlot {
    pub day: Day,
    pub start: u8,
    pub end: u8,
}

impl TimeSlot {
    /// True when the two slots sit on the same day and one ends exactly when the other starts.
    pub fn is_back_to_back(&self, other: &TimeSlot) -> bool {
        self.day == other.day && (self.end == other.start || other.end == self.start)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:00-{}:00", self.day, self.start, self.end)
    }
}

pub fn default_days() -> Vec<Day> {
    vec![Day::Monday, Day::Tuesday, Day::Wednesday, Day::Thursday, Day::Friday]
}

/// Hourly periods with a lunch break between 13:00 and 14:00.
pub fn default_periods() -> Vec<Period> {
    vec![
        Period::new(9, 10),
        Period::new(10, 11),
        Period::new(11, 12),
        Period::new(12, 13),
        Period::new(14, 15),
        Period::new(15, 16),
    ]
}

/// The complete input for the scheduling problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub courses: Vec<Course>,
    pub faculty: Vec<Faculty>,
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub lectures: Vec<Binding>,
    #[serde(default)]
    pub labs: Vec<Binding>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default = "default_days")]
    pub days: Vec<Day>,
    #[serde(default = "default_periods")]
    pub periods: Vec<Period>,
}

/// Family of hard constraints, used both for violations and as the infeasibility hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintClass {
    Faculty,
    Room,
    StudentOverlap,
}

impl fmt::Display for ConstraintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintClass::Faculty => f.write_str("faculty"),
            ConstraintClass::Room => f.write_str("room"),
            ConstraintClass::StudentOverlap => f.write_str("student-overlap"),
        }
    }
}

/// Represents a single, fully bound session in the final schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub session_id: usize,
    pub course_id: CourseId,
    pub course_name: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub slot: SlotIndex,
    pub time_slot: TimeSlot,
    pub faculty_id: FacultyId,
    pub room_id: RoomId,
}

/// Two sessions sharing a slot they are not allowed to share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardViolation {
    pub class: ConstraintClass,
    pub sessions: (usize, usize),
    pub slot: SlotIndex,
    /// Faculty, room or student id the clash is about.
    pub resource: String,
}

impl fmt::Display for HardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] sessions {} and {} share slot {} ({})",
            self.class, self.sessions.0, self.sessions.1, self.slot, self.resource
        )
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    Ok,
    Infeasible,
    DeadlineExceeded,
    InvariantViolation,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Ok => f.write_str("ok"),
            SolveStatus::Infeasible => f.write_str("infeasible"),
            SolveStatus::DeadlineExceeded => f.write_str("deadline-exceeded"),
            SolveStatus::InvariantViolation => f.write_str("invariant-violation"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStats {
    pub sessions: usize,
    pub csp_nodes: u64,
    pub csp_backtracks: u64,
    pub generations: usize,
    pub elapsed_ms: u64,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub status: SolveStatus,
    pub assignments: Vec<Assignment>,
    /// Total penalty of `assignments`; lower is better.
    pub penalty: i64,
    /// Fitness, the negated penalty.
    pub score: i64,
    pub infeasibility_hint: Option<ConstraintClass>,
    pub violations: Vec<HardViolation>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub stats: SolveStats,
}
