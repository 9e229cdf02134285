//! Errors raised before any solving starts.
//!
//! Infeasibility, deadline expiry and invariant violations are not errors:
//! they are reported through [`crate::data::SolveStatus`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{owner} references unknown {kind} `{id}`")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },

    #[error("no {0} available to bind unassigned sessions")]
    EmptyPool(&'static str),

    #[error("slot domain is empty: at least one day and one period are required")]
    EmptySlotDomain,

    #[error("invalid period {start}-{end}: start must be before end")]
    InvalidPeriod { start: u8, end: u8 },

    #[error("session {0} has no faculty or room binding")]
    UnboundSession(usize),

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
