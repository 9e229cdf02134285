//! Domain model builder.
//!
//! Validates a [`SchedulingInput`], expands every course into its lecture and
//! lab sessions, and binds each session to a faculty member and a room.
//! Session order is fixed here (course input order, lectures before labs) and
//! every later stage indexes sessions by that order.

use itertools::Itertools;
use log::{debug, trace};
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::data::{
    Binding, Course, CourseId, Day, Faculty, FacultyId, Period, Room, RoomId, SchedulingInput,
    SessionKind, SlotIndex, Student, TimeSlot, default_days, default_periods,
};
use crate::error::{Result, ScheduleError};

/// The ordered, finite set of slots sessions can be placed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDomain {
    slots: Vec<TimeSlot>,
}

impl SlotDomain {
    /// Day-major product of `days` and `periods`.
    pub fn new(days: &[Day], periods: &[Period]) -> Self {
        let slots = days
            .iter()
            .cartesian_product(periods)
            .map(|(&day, period)| TimeSlot {
                day,
                start: period.start,
                end: period.end,
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: SlotIndex) -> Option<&TimeSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }
}

impl Default for SlotDomain {
    fn default() -> Self {
        Self::new(&default_days(), &default_periods())
    }
}

/// One meeting of a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Position in [`Problem::sessions`].
    pub id: usize,
    pub course_id: CourseId,
    pub kind: SessionKind,
    pub slot: Option<SlotIndex>,
    pub faculty_id: Option<FacultyId>,
    pub room_id: Option<RoomId>,
}

/// A validated scheduling instance.
#[derive(Debug, Clone)]
pub struct Problem {
    pub courses: Vec<Course>,
    pub faculty: Vec<Faculty>,
    pub rooms: Vec<Room>,
    pub students: Vec<Student>,
    pub sessions: Vec<Session>,
    pub domain: SlotDomain,
}

impl Problem {
    /// Validates `input` and expands it into sessions.
    ///
    /// Explicit lecture and lab bindings are applied as fixed inputs; sessions
    /// without one keep `None` until [`Problem::bind_resources`] runs.
    pub fn build(input: &SchedulingInput) -> Result<Self> {
        validate(input)?;

        let lecture_bindings = index_bindings(&input.lectures);
        let lab_bindings = index_bindings(&input.labs);

        let mut sessions = Vec::new();
        for course in &input.courses {
            let kinds = std::iter::repeat_n(SessionKind::Lecture, course.lecture_count as usize)
                .chain(std::iter::repeat_n(SessionKind::Lab, course.lab_sessions() as usize));
            for kind in kinds {
                let lecture = lecture_bindings.get(course.id.as_str()).copied();
                let binding = match kind {
                    SessionKind::Lecture => lecture,
                    SessionKind::Lab => lab_bindings.get(course.id.as_str()).copied().or(lecture),
                };
                sessions.push(Session {
                    id: sessions.len(),
                    course_id: course.id.clone(),
                    kind,
                    slot: None,
                    faculty_id: binding.and_then(|b| non_empty(&b.faculty_id)),
                    room_id: binding.and_then(|b| non_empty(&b.room_id)),
                });
            }
        }
        debug!(
            "Expanded {} courses into {} sessions ({} pre-bound to faculty, {} to rooms)",
            input.courses.len(),
            sessions.len(),
            sessions.iter().filter(|s| s.faculty_id.is_some()).count(),
            sessions.iter().filter(|s| s.room_id.is_some()).count()
        );

        Ok(Self {
            courses: input.courses.clone(),
            faculty: input.faculty.clone(),
            rooms: input.rooms.clone(),
            students: input.students.clone(),
            sessions,
            domain: SlotDomain::new(&input.days, &input.periods),
        })
    }

    /// Draws a faculty member and a room for every session that has none.
    ///
    /// Faculty come uniformly from the whole pool. Rooms come uniformly from
    /// the rooms whose type matches the session kind, or from every room when
    /// no room of that type exists.
    pub fn bind_resources<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let needs_faculty = self.sessions.iter().any(|s| s.faculty_id.is_none());
        let needs_room = self.sessions.iter().any(|s| s.room_id.is_none());
        if needs_faculty && self.faculty.is_empty() {
            return Err(ScheduleError::EmptyPool("faculty"));
        }
        if needs_room && self.rooms.is_empty() {
            return Err(ScheduleError::EmptyPool("rooms"));
        }

        let rooms_for = |kind: SessionKind| -> Vec<&RoomId> {
            let preferred: Vec<&RoomId> = self
                .rooms
                .iter()
                .filter(|room| room.room_type == kind)
                .map(|room| &room.id)
                .collect();
            if preferred.is_empty() {
                self.rooms.iter().map(|room| &room.id).collect()
            } else {
                preferred
            }
        };
        let lecture_rooms = rooms_for(SessionKind::Lecture);
        let lab_rooms = rooms_for(SessionKind::Lab);

        let mut draws = Vec::with_capacity(self.sessions.len());
        for session in &self.sessions {
            let faculty_id = match &session.faculty_id {
                Some(id) => id.clone(),
                None => self.faculty[rng.random_range(0..self.faculty.len())].id.clone(),
            };
            let room_id = match &session.room_id {
                Some(id) => id.clone(),
                None => {
                    let pool = match session.kind {
                        SessionKind::Lecture => &lecture_rooms,
                        SessionKind::Lab => &lab_rooms,
                    };
                    pool[rng.random_range(0..pool.len())].clone()
                }
            };
            trace!(
                "Session {} ({} {}) bound to faculty {} in room {}",
                session.id, session.course_id, session.kind, faculty_id, room_id
            );
            draws.push((faculty_id, room_id));
        }

        for (session, (faculty_id, room_id)) in self.sessions.iter_mut().zip(draws) {
            session.faculty_id = Some(faculty_id);
            session.room_id = Some(room_id);
        }
        Ok(())
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    /// Sessions of each course, keyed by course id.
    pub fn sessions_by_course(&self) -> HashMap<&str, Vec<usize>> {
        self.sessions
            .iter()
            .map(|session| (session.course_id.as_str(), session.id))
            .into_group_map()
    }
}

fn non_empty(id: &Option<String>) -> Option<String> {
    id.as_ref().filter(|id| !id.is_empty()).cloned()
}

/// Later bindings for the same course replace earlier ones.
fn index_bindings(bindings: &[Binding]) -> HashMap<&str, &Binding> {
    bindings
        .iter()
        .map(|binding| (binding.course_id.as_str(), binding))
        .collect()
}

fn validate(input: &SchedulingInput) -> Result<()> {
    if input.days.is_empty() || input.periods.is_empty() {
        return Err(ScheduleError::EmptySlotDomain);
    }
    if let Some(period) = input.periods.iter().find(|p| p.start >= p.end) {
        return Err(ScheduleError::InvalidPeriod {
            start: period.start,
            end: period.end,
        });
    }

    check_unique("course", input.courses.iter().map(|c| c.id.as_str()))?;
    check_unique("faculty", input.faculty.iter().map(|f| f.id.as_str()))?;
    check_unique("room", input.rooms.iter().map(|r| r.id.as_str()))?;

    let course_ids: HashSet<&str> = input.courses.iter().map(|c| c.id.as_str()).collect();
    let faculty_ids: HashSet<&str> = input.faculty.iter().map(|f| f.id.as_str()).collect();
    let room_ids: HashSet<&str> = input.rooms.iter().map(|r| r.id.as_str()).collect();

    let bindings = input
        .lectures
        .iter()
        .map(|b| ("lecture", b))
        .chain(input.labs.iter().map(|b| ("lab", b)));
    for (label, binding) in bindings {
        let owner = match &binding.id {
            Some(id) if !id.is_empty() => format!("{label} binding `{id}`"),
            _ => format!("{label} binding for course `{}`", binding.course_id),
        };
        if !course_ids.contains(binding.course_id.as_str()) {
            return Err(unknown(owner, "course", &binding.course_id));
        }
        if let Some(id) = non_empty(&binding.faculty_id) {
            if !faculty_ids.contains(id.as_str()) {
                return Err(unknown(owner, "faculty", &id));
            }
        }
        if let Some(id) = non_empty(&binding.room_id) {
            if !room_ids.contains(id.as_str()) {
                return Err(unknown(owner, "room", &id));
            }
        }
    }

    for student in &input.students {
        if let Some(course) = student
            .enrolled_courses
            .iter()
            .find(|id| !course_ids.contains(id.as_str()))
        {
            return Err(unknown(format!("student `{}`", student.id), "course", course));
        }
    }
    Ok(())
}

fn check_unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    match ids.duplicates().next() {
        Some(id) => Err(ScheduleError::DuplicateId {
            kind,
            id: id.to_string(),
        }),
        None => Ok(()),
    }
}

fn unknown(owner: String, kind: &'static str, id: &str) -> ScheduleError {
    ScheduleError::UnknownReference {
        owner,
        kind,
        id: id.to_string(),
    }
}
