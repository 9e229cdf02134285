use crate::config::SolveOptions;
use crate::csp::{CspOutcome, CspResult, SlotCsp};
use crate::data::{
    Assignment, Course, HardViolation, SchedulingInput, SchedulingOutput, SlotIndex, SolveStats, SolveStatus,
};
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::model::Problem;
use crate::optimizer::GeneticOptimizer;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Instant;

/// solves the scheduling problem: CSP for a feasible timetable, then GA to lower its penalty.
///
/// Infeasible instances and expired deadlines are reported through the
/// returned status; `Err` is reserved for invalid input.
pub fn solve(input: &SchedulingInput, options: &SolveOptions) -> Result<SchedulingOutput> {
    let start_time = Instant::now();
    options.validate()?;
    let deadline = options.deadline(start_time);
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);

    // model setup
    let mut problem = Problem::build(input)?;
    problem.bind_resources(&mut rng)?;
    let evaluator = Evaluator::new(&problem)?;
    info!(
        "Built model with {} sessions over {} slots ({} faculty, {} rooms, {} students)",
        problem.sessions.len(),
        problem.domain.len(),
        problem.faculty.len(),
        problem.rooms.len(),
        problem.students.len()
    );

    // hard constraints
    let csp = SlotCsp::for_problem(&problem);
    info!(
        "Starting CSP search with {} constraint groups...",
        csp.groups().len()
    );
    let CspResult {
        outcome,
        stats: csp_stats,
    } = csp.solve(deadline);
    let mut stats = SolveStats {
        sessions: problem.sessions.len(),
        csp_nodes: csp_stats.nodes,
        csp_backtracks: csp_stats.backtracks,
        ..SolveStats::default()
    };

    let (status, slots) = match outcome {
        CspOutcome::Infeasible { hint } => {
            warn!(
                "No feasible timetable exists; last failing constraint class: {}",
                hint.map_or_else(|| "none".to_string(), |class| class.to_string())
            );
            stats.elapsed_ms = elapsed_ms(start_time);
            return Ok(SchedulingOutput {
                status: SolveStatus::Infeasible,
                assignments: Vec::new(),
                penalty: 0,
                score: 0,
                infeasibility_hint: hint,
                violations: Vec::new(),
                unmet_soft_constraints: Vec::new(),
                stats,
            });
        }
        CspOutcome::DeadlineExceeded(partial) => {
            warn!("Deadline reached during CSP search; returning a partial timetable");
            (SolveStatus::DeadlineExceeded, partial)
        }
        CspOutcome::Solved(seed) => {
            info!("Feasible timetable found in {:.2?}", start_time.elapsed());

            // soft constraints
            let optimizer =
                GeneticOptimizer::new(&options.optimizer, &evaluator, problem.domain.len());
            let outcome = optimizer.run(&seed, &mut rng, deadline);
            stats.generations = outcome.generations;
            info!(
                "Optimizer lowered penalty from {} to {} in {} generations",
                outcome.seed_penalty, outcome.best.penalty, outcome.generations
            );
            let status = if outcome.deadline_exceeded {
                SolveStatus::DeadlineExceeded
            } else {
                SolveStatus::Ok
            };
            (status, outcome.best.slots)
        }
    };

    // final hard-constraint check
    let violations = evaluator.hard_violations(&slots);
    let status = final_status(status, &violations);

    let penalty = evaluator.penalty(&slots);
    let assignments = assignments(&problem, &slots);
    stats.elapsed_ms = elapsed_ms(start_time);
    info!(
        "Solve finished with status {} and penalty {} in {} ms",
        status, penalty, stats.elapsed_ms
    );

    Ok(SchedulingOutput {
        status,
        assignments,
        penalty,
        score: -penalty,
        infeasibility_hint: None,
        violations,
        unmet_soft_constraints: evaluator.unmet_soft_constraints(&slots),
        stats,
    })
}

/// Downgrades `Ok` when the returned timetable breaks a hard constraint.
/// Deadline results may be partial, so they keep their status.
fn final_status(status: SolveStatus, violations: &[HardViolation]) -> SolveStatus {
    match violations.first() {
        Some(first) if status == SolveStatus::Ok => {
            warn!(
                "Optimized timetable breaks {} hard constraints, first: {}",
                violations.len(),
                first
            );
            SolveStatus::InvariantViolation
        }
        _ => status,
    }
}

// map slot vector back onto the session records
fn assignments(problem: &Problem, slots: &[SlotIndex]) -> Vec<Assignment> {
    let course_map: HashMap<&str, &Course> = problem
        .courses
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect();

    problem
        .sessions
        .iter()
        .zip(slots)
        .filter_map(|(session, &slot)| {
            let time_slot = *problem.domain.get(slot)?;
            Some(Assignment {
                session_id: session.id,
                course_id: session.course_id.clone(),
                course_name: course_map
                    .get(session.course_id.as_str())
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                kind: session.kind,
                slot,
                time_slot,
                faculty_id: session.faculty_id.clone().unwrap_or_default(),
                room_id: session.room_id.clone().unwrap_or_default(),
            })
        })
        .collect()
}

fn elapsed_ms(start_time: Instant) -> u64 {
    u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
}
