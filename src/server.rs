//! HTTP adapter: JSON in, rendered timetable out.
//!
//! All display formatting (names, `"<Day> <start>:00-<end>:00"` slots) lives
//! here; the solver itself only deals in ids and slot indices.

use axum::{Json, Router, extract::rejection::JsonRejection, http::StatusCode, routing::post};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::config::SolveOptions;
use crate::data::{
    ConstraintClass, HardViolation, SchedulingInput, SchedulingOutput, SessionKind, SolveStats,
    SolveStatus, UnmetSoftConstraint,
};
use crate::solver;

/// Request body: the scheduling input plus optional solve options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    #[serde(flatten)]
    pub input: SchedulingInput,
    #[serde(default)]
    pub options: SolveOptions,
}

/// One row of the rendered timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub course_id: String,
    pub course_name: String,
    pub time_slot: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub room_id: String,
    pub room_name: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub status: SolveStatus,
    pub message: String,
    pub timetable: Vec<TimetableEntry>,
    pub score: i64,
    pub penalty: i64,
    pub infeasibility_hint: Option<ConstraintClass>,
    pub violations: Vec<HardViolation>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub stats: SolveStats,
}

async fn solve_handler(
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<SolveResponse>, (StatusCode, Json<Value>)> {
    let Json(request) =
        payload.map_err(|rejection| error_response(rejection.status(), rejection.body_text()))?;
    let solved = tokio::task::spawn_blocking(move || {
        solver::solve(&request.input, &request.options).map(|output| render(&request.input, output))
    })
    .await;

    match solved {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!("Solver task failed: {e}");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "solver task failed".to_string(),
            ))
        }
    }
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "status": "error", "message": message })))
}

/// Attaches display names to the solver's assignments.
pub fn render(input: &SchedulingInput, output: SchedulingOutput) -> SolveResponse {
    let faculty_names: HashMap<&str, &str> = input
        .faculty
        .iter()
        .map(|f| (f.id.as_str(), f.name.as_str()))
        .collect();
    let room_names: HashMap<&str, &str> = input
        .rooms
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();

    let timetable = output
        .assignments
        .into_iter()
        .map(|a| TimetableEntry {
            faculty_name: faculty_names
                .get(a.faculty_id.as_str())
                .map_or_else(|| "Unknown Faculty".to_string(), |name| name.to_string()),
            room_name: room_names
                .get(a.room_id.as_str())
                .map_or_else(|| format!("Room {}", a.room_id), |name| name.to_string()),
            time_slot: a.time_slot.to_string(),
            course_id: a.course_id,
            course_name: a.course_name,
            faculty_id: a.faculty_id,
            room_id: a.room_id,
            kind: a.kind,
        })
        .collect();

    let message = match output.status {
        SolveStatus::Ok => "Timetable generated successfully",
        SolveStatus::Infeasible => "Could not generate a feasible timetable with the given constraints",
        SolveStatus::DeadlineExceeded => "Time limit reached; returning the best timetable found",
        SolveStatus::InvariantViolation => "Optimized timetable violates hard constraints",
    };

    SolveResponse {
        status: output.status,
        message: message.to_string(),
        timetable,
        score: output.score,
        penalty: output.penalty,
        infeasibility_hint: output.infeasibility_hint,
        violations: output.violations,
        unmet_soft_constraints: output.unmet_soft_constraints,
        stats: output.stats,
    }
}

pub fn app() -> Router {
    Router::new().route("/v1/schedule/solve", post(solve_handler))
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app()).await
}
