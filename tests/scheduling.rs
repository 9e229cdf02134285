use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};
use timetable_solver::data::{
    Binding, ConstraintClass, Course, Faculty, Room, SchedulingInput,
    SchedulingOutput, SessionKind, SolveStatus, Student, default_days, default_periods,
};
use timetable_solver::{ScheduleError, SolveOptions, solve};

fn course(id: &str, lectures: u32, labs: u32) -> Course {
    Course {
        id: id.into(),
        name: format!("Course {id}"),
        lecture_count: lectures,
        has_lab: labs > 0,
        lab_count: labs,
    }
}

fn faculty(id: &str) -> Faculty {
    Faculty {
        id: id.into(),
        name: format!("Dr. {id}"),
    }
}

fn room(id: &str, room_type: SessionKind) -> Room {
    Room {
        id: id.into(),
        name: format!("Room {id}"),
        capacity: 40,
        room_type,
    }
}

fn bind(course: &str, faculty: &str, room: &str) -> Binding {
    Binding {
        id: None,
        course_id: course.into(),
        faculty_id: Some(faculty.into()),
        room_id: Some(room.into()),
    }
}

fn student(id: &str, courses: &[&str]) -> Student {
    Student {
        id: id.into(),
        enrolled_courses: courses.iter().map(|c| c.to_string()).collect(),
    }
}

fn instance(courses: Vec<Course>, faculty: Vec<Faculty>, rooms: Vec<Room>) -> SchedulingInput {
    SchedulingInput {
        courses,
        faculty,
        rooms,
        lectures: Vec::new(),
        labs: Vec::new(),
        students: Vec::new(),
        days: default_days(),
        periods: default_periods(),
    }
}

/// The sample department used when no data is uploaded.
fn department() -> SchedulingInput {
    let mut input = instance(
        vec![course("CS101", 3, 1), course("CS201", 2, 2), course("MA101", 3, 0)],
        vec![faculty("F1"), faculty("F2"), faculty("F3")],
        vec![
            room("R1", SessionKind::Lecture),
            room("R2", SessionKind::Lecture),
            room("R3", SessionKind::Lab),
        ],
    );
    input.students = vec![
        student("S1", &["CS101", "MA101"]),
        student("S2", &["CS101", "CS201"]),
        student("S3", &["CS201", "MA101"]),
    ];
    input
}

/// Checks that no faculty member, room or student is double-booked.
fn assert_feasible(input: &SchedulingInput, output: &SchedulingOutput) {
    let by_faculty = output
        .assignments
        .iter()
        .map(|a| (a.faculty_id.clone(), a.slot))
        .into_group_map();
    let by_room = output
        .assignments
        .iter()
        .map(|a| (a.room_id.clone(), a.slot))
        .into_group_map();
    for (resource, slots) in by_faculty.into_iter().chain(by_room) {
        assert!(slots.iter().all_unique(), "{resource} is double-booked: {slots:?}");
    }
    for student in &input.students {
        let slots: Vec<usize> = output
            .assignments
            .iter()
            .filter(|a| student.enrolled_courses.contains(&a.course_id))
            .map(|a| a.slot)
            .collect();
        assert!(slots.iter().all_unique(), "student {} has a clash: {slots:?}", student.id);
    }
}

#[test]
fn sample_department_is_feasible() {
    let input = department();
    for seed in 0..5 {
        let output = solve(&input, &SolveOptions::with_seed(seed)).unwrap();
        assert_eq!(output.status, SolveStatus::Ok);
        assert_eq!(output.assignments.len(), 11);
        assert!(output.violations.is_empty());
        assert_feasible(&input, &output);
        for assignment in &output.assignments {
            let expected_room = match assignment.kind {
                SessionKind::Lecture => ["R1", "R2"].contains(&assignment.room_id.as_str()),
                SessionKind::Lab => assignment.room_id == "R3",
            };
            assert!(expected_room, "{assignment:?} is in the wrong kind of room");
        }
    }
}

#[test]
fn two_unrelated_courses_are_feasible() {
    let mut input = instance(
        vec![course("A", 1, 0), course("B", 1, 0)],
        vec![faculty("F1"), faculty("F2")],
        vec![room("R1", SessionKind::Lecture), room("R2", SessionKind::Lecture)],
    );
    input.lectures = vec![bind("A", "F1", "R1"), bind("B", "F2", "R2")];
    let output = solve(&input, &SolveOptions::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Ok);
    assert_eq!(output.assignments.len(), 2);
    assert_eq!(output.penalty, 0);
}

#[test]
fn shared_faculty_gets_different_slots() {
    let mut input = instance(
        vec![course("A", 1, 0), course("B", 1, 0)],
        vec![faculty("F1"), faculty("F2")],
        vec![room("R1", SessionKind::Lecture), room("R2", SessionKind::Lecture)],
    );
    input.lectures = vec![bind("A", "F1", "R1"), bind("B", "F1", "R2")];
    let output = solve(&input, &SolveOptions::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Ok);
    assert_ne!(output.assignments[0].slot, output.assignments[1].slot);
    assert_eq!(output.assignments[0].faculty_id, "F1");
    assert_eq!(output.assignments[1].faculty_id, "F1");
    // The optimizer also moves them apart.
    assert_eq!(output.penalty, 0);
}

#[test]
fn co_enrolled_courses_get_different_slots() {
    let mut input = instance(
        vec![course("A", 1, 0), course("B", 1, 0)],
        vec![faculty("F1"), faculty("F2")],
        vec![room("R1", SessionKind::Lecture), room("R2", SessionKind::Lecture)],
    );
    input.lectures = vec![bind("A", "F1", "R1"), bind("B", "F2", "R2")];
    input.students = vec![student("S1", &["A", "B"])];
    let output = solve(&input, &SolveOptions::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Ok);
    assert_ne!(output.assignments[0].slot, output.assignments[1].slot);
}

#[test]
fn sessions_of_one_enrolled_course_do_not_overlap() {
    let mut input = instance(
        vec![course("A", 2, 1)],
        vec![faculty("F1"), faculty("F2"), faculty("F3")],
        vec![
            room("R1", SessionKind::Lecture),
            room("R2", SessionKind::Lecture),
            room("L1", SessionKind::Lab),
        ],
    );
    input.students = vec![student("S1", &["A"])];
    let output = solve(&input, &SolveOptions::with_seed(5)).unwrap();
    assert_eq!(output.status, SolveStatus::Ok);
    assert!(output.assignments.iter().map(|a| a.slot).all_unique());
}

#[test]
fn single_faculty_over_capacity_is_infeasible() {
    let courses: Vec<Course> = (0..31).map(|i| course(&format!("C{i}"), 1, 0)).collect();
    let rooms: Vec<Room> = (0..31)
        .map(|i| room(&format!("R{i}"), SessionKind::Lecture))
        .collect();
    let input = instance(courses, vec![faculty("F1")], rooms);

    let output = solve(&input, &SolveOptions::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Infeasible);
    assert_eq!(output.infeasibility_hint, Some(ConstraintClass::Faculty));
    assert!(output.assignments.is_empty());
    assert_eq!(output.stats.generations, 0);
}

#[test]
fn huge_single_faculty_load_is_refuted_quickly() {
    let input = instance(
        vec![course("BIG", 10_000, 0)],
        vec![faculty("F1")],
        vec![room("R1", SessionKind::Lecture)],
    );
    let options = SolveOptions {
        time_limit_ms: Some(100),
        ..SolveOptions::default()
    };

    let started = Instant::now();
    let output = solve(&input, &options).unwrap();
    assert_eq!(output.status, SolveStatus::Infeasible);
    assert_eq!(output.infeasibility_hint, Some(ConstraintClass::Faculty));
    assert_eq!(output.stats.sessions, 10_000);
    assert_eq!(output.stats.csp_nodes, 0);
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
}

/// Small department with random sizes, lab flags and enrollments.
fn random_instance(rng: &mut ChaCha8Rng) -> SchedulingInput {
    let courses: Vec<Course> = (0..rng.random_range(1..=5))
        .map(|i| course(&format!("C{i}"), rng.random_range(1..=2), rng.random_range(0..=1)))
        .collect();
    let faculty: Vec<Faculty> = (0..rng.random_range(1..=3))
        .map(|i| faculty(&format!("F{i}")))
        .collect();
    let mut rooms: Vec<Room> = (0..rng.random_range(1..=3))
        .map(|i| room(&format!("R{i}"), SessionKind::Lecture))
        .collect();
    rooms.extend((0..rng.random_range(0..=1)).map(|i| room(&format!("L{i}"), SessionKind::Lab)));

    let course_ids: Vec<String> = courses.iter().map(|c| c.id.clone()).collect();
    let students: Vec<Student> = (0..rng.random_range(0..=4))
        .map(|i| {
            let count = rng.random_range(1..=course_ids.len());
            let enrolled: Vec<&str> = rand::seq::index::sample(&mut *rng, course_ids.len(), count)
                .into_iter()
                .map(|c| course_ids[c].as_str())
                .collect();
            student(&format!("S{i}"), &enrolled)
        })
        .collect();

    let mut input = instance(courses, faculty, rooms);
    input.students = students;
    input.days.truncate(rng.random_range(1..=5));
    input
}

#[test]
fn random_instances_are_feasible_or_refuted() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut solved = 0;
    for round in 0..100 {
        let input = random_instance(&mut rng);
        let mut options = SolveOptions::with_seed(round);
        options.optimizer.generations = 10;
        let output = solve(&input, &options).unwrap();
        match output.status {
            SolveStatus::Ok => {
                solved += 1;
                assert!(output.violations.is_empty(), "round {round}: {:?}", output.violations);
                assert_feasible(&input, &output);
            }
            SolveStatus::Infeasible => {
                assert!(output.assignments.is_empty());
                assert!(output.infeasibility_hint.is_some(), "round {round}");
            }
            other => panic!("round {round}: unexpected status {other}"),
        }
    }
    assert!(solved > 0);
}

#[test]
fn single_room_over_capacity_hints_room() {
    let courses: Vec<Course> = (0..4).map(|i| course(&format!("C{i}"), 1, 0)).collect();
    let mut input = instance(
        courses,
        (0..4).map(|i| faculty(&format!("F{i}"))).collect(),
        vec![room("R1", SessionKind::Lecture)],
    );
    input.lectures = (0..4).map(|i| bind(&format!("C{i}"), &format!("F{i}"), "R1")).collect();
    input.days = vec![timetable_solver::data::Day::Monday];
    input.periods.truncate(3);

    let output = solve(&input, &SolveOptions::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Infeasible);
    assert_eq!(output.infeasibility_hint, Some(ConstraintClass::Room));
}

#[test]
fn same_seed_gives_identical_timetables() {
    let input = department();
    let options = SolveOptions::with_seed(17);
    let first = solve(&input, &options).unwrap();
    let second = solve(&input, &options).unwrap();
    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.penalty, second.penalty);
    assert_eq!(first.unmet_soft_constraints, second.unmet_soft_constraints);
    assert_eq!(
        serde_json::to_string(&first.assignments).unwrap(),
        serde_json::to_string(&second.assignments).unwrap()
    );
}

#[test]
fn expired_time_limit_reports_deadline() {
    let input = department();
    let options = SolveOptions {
        time_limit_ms: Some(0),
        ..SolveOptions::default()
    };
    let output = solve(&input, &options).unwrap();
    assert_eq!(output.status, SolveStatus::DeadlineExceeded);
    assert_eq!(output.assignments.len(), 11);
    // Everything starts in the first slot, so every clash is reported and nothing is back-to-back.
    assert!(output.assignments.iter().all(|a| a.slot == 0));
    assert!(output.unmet_soft_constraints.is_empty());
    assert_eq!(output.penalty, output.violations.len() as i64 * 10);
}

#[test]
fn unknown_enrollment_fails_fast() {
    let mut input = department();
    input.students.push(student("S9", &["PH999"]));
    let err = solve(&input, &SolveOptions::default()).unwrap_err();
    assert!(matches!(err, ScheduleError::UnknownReference { kind: "course", .. }));
    assert_eq!(err.to_string(), "student `S9` references unknown course `PH999`");
}

#[test]
fn unknown_room_in_lab_binding_fails_fast() {
    let mut input = department();
    input.labs = vec![Binding {
        id: Some("LAB1".into()),
        course_id: "CS101".into(),
        faculty_id: None,
        room_id: Some("R404".into()),
    }];
    let err = solve(&input, &SolveOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "lab binding `LAB1` references unknown room `R404`");
}
