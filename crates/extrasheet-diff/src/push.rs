//! Submits a [`RequestPlan`] as one atomic `batchUpdate`.
//!
//! The remote applies all requests or none. On rejection the failing
//! request is located from the `requests[N]` marker in the error message.

use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::requests::RequestPlan;
use crate::transport::{BatchUpdateTransport, TransportError};

/// Reply paths of remotely-assigned ids, per request kind.
const ASSIGNED_ID_PATHS: &[(&str, &str)] = &[
    ("addSheet", "/addSheet/properties/sheetId"),
    ("addChart", "/addChart/chart/chartId"),
    ("addTable", "/addTable/table/tableId"),
    ("addFilterView", "/addFilterView/filter/filterViewId"),
    ("addBanding", "/addBanding/bandedRange/bandedRangeId"),
    ("addSlicer", "/addSlicer/slicer/slicerId"),
    ("addProtectedRange", "/addProtectedRange/protectedRange/protectedRangeId"),
    ("addNamedRange", "/addNamedRange/namedRange/namedRangeId"),
];

/// An id the remote assigned to an object created by the push.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignedId {
    pub request_index: usize,
    pub kind: &'static str,
    pub id: JsonValue,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PushOutcome {
    /// One reply per request; empty when nothing was sent.
    pub replies: Vec<JsonValue>,
    pub assigned: Vec<AssignedId>,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("batchUpdate rejected{} (HTTP {status}): {message}", describe_index(.index))]
    Remote {
        /// Index of the failing request, when the remote named one.
        index: Option<usize>,
        status: u16,
        message: String,
        /// The failing request as sent.
        payload: Option<JsonValue>,
    },

    #[error("batchUpdate timed out after {0:?}; the remote state is unknown, re-fetch before retrying")]
    Timeout(Duration),

    #[error("batchUpdate failed: {0}")]
    Transport(String),
}

fn describe_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" at request {i}"),
        None => String::new(),
    }
}

impl PushError {
    /// True when the remote may or may not have applied the batch.
    pub fn outcome_unknown(&self) -> bool {
        match self {
            PushError::Remote { status, .. } => *status >= 500,
            PushError::Timeout(_) | PushError::Transport(_) => true,
        }
    }

    fn from_transport(error: TransportError, plan: &RequestPlan) -> Self {
        match error {
            TransportError::Status { status, body } => {
                let message = remote_message(&body);
                let index = failing_request_index(&message);
                let payload = index
                    .and_then(|i| plan.requests.get(i))
                    .map(|request| request.to_json());
                PushError::Remote {
                    index,
                    status,
                    message,
                    payload,
                }
            }
            TransportError::Timeout(after) => PushError::Timeout(after),
            TransportError::Other(message) => PushError::Transport(message),
        }
    }
}

/// `error.message` of a Google API error body, or the raw body.
fn remote_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parses the index out of messages like `Invalid requests[3].updateCells: ...`.
fn failing_request_index(message: &str) -> Option<usize> {
    let start = message.find("requests[")? + "requests[".len();
    let rest = &message[start..];
    let end = rest.find(']')?;
    rest[..end].parse().ok()
}

fn assigned_ids(plan: &RequestPlan, replies: &[JsonValue]) -> Vec<AssignedId> {
    let mut assigned = Vec::new();
    for (index, (request, reply)) in plan.requests.iter().zip(replies).enumerate() {
        let kind = request.kind();
        let Some((_, path)) = ASSIGNED_ID_PATHS.iter().find(|(k, _)| *k == kind) else {
            continue;
        };
        if let Some(id) = reply.pointer(path) {
            assigned.push(AssignedId {
                request_index: index,
                kind,
                id: id.clone(),
            });
        }
    }
    assigned
}

pub struct PushExecutor<T> {
    transport: T,
}

impl<T: BatchUpdateTransport> PushExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Sends `plan` in a single call. An empty plan makes no call.
    pub fn push(&self, spreadsheet_id: &str, plan: &RequestPlan) -> Result<PushOutcome, PushError> {
        if plan.is_empty() {
            log::info!("nothing to push");
            return Ok(PushOutcome::default());
        }
        let structural = plan.requests.iter().filter(|r| r.is_structural()).count();
        if structural > 0 {
            log::warn!("plan carries {structural} row/column structure requests");
        }

        log::info!("pushing {} requests to {spreadsheet_id}", plan.len());
        let response = self
            .transport
            .batch_update(spreadsheet_id, &plan.body())
            .map_err(|e| PushError::from_transport(e, plan))?;

        let replies = response
            .get("replies")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        if replies.len() != plan.len() {
            log::warn!(
                "expected {} replies, remote returned {}",
                plan.len(),
                replies.len()
            );
        }
        let assigned = assigned_ids(plan, &replies);
        for id in &assigned {
            log::info!("{} (request {}) assigned id {}", id.kind, id.request_index, id.id);
        }
        Ok(PushOutcome { replies, assigned })
    }
}
