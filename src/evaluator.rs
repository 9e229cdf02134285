//! Penalty scoring of complete candidate schedules.
//!
//! A candidate is a slot vector indexed by session id; faculty and room
//! bindings are fixed per solve and interned here once, so scoring a
//! candidate only touches integer tables.

use itertools::Itertools;
use std::collections::HashMap;

use crate::data::{
    ConstraintClass, HardViolation, SlotIndex, TimeSlot, UnmetSoftConstraint,
};
use crate::error::{Result, ScheduleError};
use crate::model::Problem;

/// Penalty for two sessions sharing a slot and a faculty member, a room, or a student.
///
/// The student term is charged on top of the faculty, room and back-to-back
/// terms, so a schedule with a student clash reports 10 more per clashing pair
/// than those three terms alone. Clash-free schedules score the same either way.
pub const CLASH_PENALTY: i64 = 10;
/// Penalty for a faculty member teaching two directly consecutive periods.
pub const BACK_TO_BACK_PENALTY: i64 = 1;

/// Read-only scoring tables for one bound problem. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    faculty: Vec<usize>,
    rooms: Vec<usize>,
    courses: Vec<usize>,
    faculty_ids: Vec<String>,
    room_ids: Vec<String>,
    course_ids: Vec<String>,
    student_ids: Vec<String>,
    /// `co_enrolled[a * n_courses + b]`: first student attending both courses.
    co_enrolled: Vec<Option<usize>>,
    slots: Vec<TimeSlot>,
}

impl Evaluator {
    /// Fails if any session is missing its faculty or room binding.
    pub fn new(problem: &Problem) -> Result<Self> {
        let mut faculty_ids = Interner::default();
        let mut room_ids = Interner::default();
        let mut course_ids = Interner::default();
        for course in &problem.courses {
            course_ids.intern(&course.id);
        }

        let mut faculty = Vec::with_capacity(problem.sessions.len());
        let mut rooms = Vec::with_capacity(problem.sessions.len());
        let mut courses = Vec::with_capacity(problem.sessions.len());
        for session in &problem.sessions {
            let (Some(faculty_id), Some(room_id)) = (&session.faculty_id, &session.room_id) else {
                return Err(ScheduleError::UnboundSession(session.id));
            };
            faculty.push(faculty_ids.intern(faculty_id));
            rooms.push(room_ids.intern(room_id));
            courses.push(course_ids.intern(&session.course_id));
        }

        let n_courses = course_ids.len();
        let mut co_enrolled = vec![None; n_courses * n_courses];
        for (student, enrollment) in problem.students.iter().enumerate() {
            let attended: Vec<usize> = enrollment
                .enrolled_courses
                .iter()
                .filter_map(|id| course_ids.get(id))
                .unique()
                .collect();
            for &a in &attended {
                for &b in &attended {
                    let cell = &mut co_enrolled[a * n_courses + b];
                    if cell.is_none() {
                        *cell = Some(student);
                    }
                }
            }
        }

        Ok(Self {
            faculty,
            rooms,
            courses,
            faculty_ids: faculty_ids.into_ids(),
            room_ids: room_ids.into_ids(),
            course_ids: course_ids.into_ids(),
            student_ids: problem.students.iter().map(|s| s.id.clone()).collect(),
            co_enrolled,
            slots: problem.domain.slots().to_vec(),
        })
    }

    /// Total penalty of a candidate; lower is better.
    ///
    /// `slots` must hold one in-domain slot per session.
    pub fn penalty(&self, slots: &[SlotIndex]) -> i64 {
        let mut penalty = 0;
        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                let same_faculty = self.faculty[i] == self.faculty[j];
                if slots[i] == slots[j] {
                    if same_faculty {
                        penalty += CLASH_PENALTY;
                    }
                    if self.rooms[i] == self.rooms[j] {
                        penalty += CLASH_PENALTY;
                    }
                    if self.shared_student(i, j).is_some() {
                        penalty += CLASH_PENALTY;
                    }
                } else if same_faculty
                    && self.slots[slots[i]].is_back_to_back(&self.slots[slots[j]])
                {
                    penalty += BACK_TO_BACK_PENALTY;
                }
            }
        }
        penalty
    }

    /// Negated penalty; higher is better.
    pub fn fitness(&self, slots: &[SlotIndex]) -> i64 {
        -self.penalty(slots)
    }

    /// Every faculty, room and student clash in the candidate.
    pub fn hard_violations(&self, slots: &[SlotIndex]) -> Vec<HardViolation> {
        let mut violations = Vec::new();
        for (i, j) in (0..slots.len()).tuple_combinations() {
            if slots[i] != slots[j] {
                continue;
            }
            let clash = |class, resource: &str| HardViolation {
                class,
                sessions: (i, j),
                slot: slots[i],
                resource: resource.to_string(),
            };
            if self.faculty[i] == self.faculty[j] {
                violations.push(clash(ConstraintClass::Faculty, &self.faculty_ids[self.faculty[i]]));
            }
            if self.rooms[i] == self.rooms[j] {
                violations.push(clash(ConstraintClass::Room, &self.room_ids[self.rooms[i]]));
            }
            if let Some(student) = self.shared_student(i, j) {
                violations.push(clash(ConstraintClass::StudentOverlap, &self.student_ids[student]));
            }
        }
        violations
    }

    /// Back-to-back teaching, one entry per consecutive pair.
    pub fn unmet_soft_constraints(&self, slots: &[SlotIndex]) -> Vec<UnmetSoftConstraint> {
        (0..slots.len())
            .tuple_combinations()
            .filter(|&(i, j)| {
                self.faculty[i] == self.faculty[j]
                    && self.slots[slots[i]].is_back_to_back(&self.slots[slots[j]])
            })
            .map(|(i, j)| {
                let (first, second) = if self.slots[slots[i]].start < self.slots[slots[j]].start {
                    (i, j)
                } else {
                    (j, i)
                };
                let (a, b) = (&self.slots[slots[first]], &self.slots[slots[second]]);
                UnmetSoftConstraint {
                    constraint_type: "Avoid Back-to-Back Classes".to_string(),
                    description: format!(
                        "Faculty {} has back-to-back classes on {}: session {} of {} ({}:00-{}:00) and session {} of {} ({}:00-{}:00).",
                        self.faculty_ids[self.faculty[first]],
                        a.day,
                        first,
                        self.course_ids[self.courses[first]],
                        a.start,
                        a.end,
                        second,
                        self.course_ids[self.courses[second]],
                        b.start,
                        b.end
                    ),
                }
            })
            .collect()
    }

    fn shared_student(&self, i: usize, j: usize) -> Option<usize> {
        let n_courses = self.course_ids.len();
        self.co_enrolled[self.courses[i] * n_courses + self.courses[j]]
    }
}

/// Maps ids to dense indices in first-seen order.
#[derive(Default)]
struct Interner<'a> {
    index: HashMap<&'a str, usize>,
    ids: Vec<&'a str>,
}

impl<'a> Interner<'a> {
    fn intern(&mut self, id: &'a str) -> usize {
        if let Some(&index) = self.index.get(id) {
            return index;
        }
        let index = self.ids.len();
        self.ids.push(id);
        self.index.insert(id, index);
        index
    }

    fn get(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn into_ids(self) -> Vec<String> {
        self.ids.into_iter().map(str::to_string).collect()
    }
}
