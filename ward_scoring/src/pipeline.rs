//! The end-to-end computation and its message envelope.
//!
//! `run_pipeline` is pure: the same request always gives the same `Derived` value. The
//! envelopes are how a request crosses into a background worker: everything is copied
//! in as JSON and copied out as JSON.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::config::*;
use crate::normalize::normalize_all;
use crate::present::{join_boundaries, Boundaries};
use crate::ranking::rank;

/// Identifies one submitted computation.
pub type RequestId = u64;

/// The only operation understood by the worker.
pub const RANK_OPERATION: &str = "rankRegions";

/// A snapshot of the inputs of one computation.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub dataset: Arc<Dataset>,
    pub boundaries: Arc<Boundaries>,
    pub weightings: Weightings,
    pub excluded_fields: Vec<String>,
}

/// Everything the presentation layer needs for one (dataset, weightings) pair.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Derived {
    /// The dataset with the `_NORMALIZED` and `_RANK` fields.
    pub dataset: Dataset,
    /// The comparison fields of the dataset.
    pub fields: BTreeSet<String>,
    /// Boundary features joined with the derived records.
    pub features: Vec<JSValue>,
    pub table: RankingTable,
}

pub fn run_pipeline(request: &PipelineRequest) -> Derived {
    let (dataset, fields) = normalize_all(&request.dataset, &request.excluded_fields);
    let features = join_boundaries(&dataset, &request.boundaries);
    let table = rank(&dataset, &request.weightings);
    info!(
        "run_pipeline: {} regions, {} fields, {} features",
        table.len(),
        fields.len(),
        features.len()
    );
    Derived {
        dataset,
        fields,
        features,
        table,
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    #[serde(rename = "operationName")]
    pub operation: String,
    pub payload: Vec<JSValue>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: RequestId,
    #[serde(rename = "operationName")]
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JSValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PipelineError {
    /// The inputs could not be serialized.
    Encode(String),
    /// A message could not be read.
    Decode(String),
    /// The worker answered with an error.
    Worker(String),
    /// The worker is gone.
    Disconnected,
    Timeout,
    /// The worker thread could not be started.
    Spawn(String),
    /// `wait` was called before any request.
    NothingRequested,
}

impl Error for PipelineError {}

impl Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Encode(msg) => write!(f, "could not encode the request: {}", msg),
            PipelineError::Decode(msg) => write!(f, "could not decode a message: {}", msg),
            PipelineError::Worker(msg) => write!(f, "computation failed: {}", msg),
            PipelineError::Disconnected => write!(f, "the background worker is not running"),
            PipelineError::Timeout => write!(f, "timed out waiting for the computation"),
            PipelineError::Spawn(msg) => write!(f, "could not start the background worker: {}", msg),
            PipelineError::NothingRequested => write!(f, "no computation was requested"),
        }
    }
}

impl From<ScoringError> for PipelineError {
    fn from(e: ScoringError) -> Self {
        PipelineError::Encode(e.to_string())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<JSValue, PipelineError> {
    serde_json::to_value(value).map_err(|e| PipelineError::Encode(e.to_string()))
}

/// The request envelope, as text. Payload: `[dataset, boundaries, weightings, excludedFields]`.
pub fn encode_request(id: RequestId, request: &PipelineRequest) -> Result<String, PipelineError> {
    let envelope = RequestEnvelope {
        id,
        operation: RANK_OPERATION.to_string(),
        payload: vec![
            to_json(request.dataset.as_ref())?,
            to_json(request.boundaries.as_ref())?,
            to_json(&request.weightings)?,
            to_json(&request.excluded_fields)?,
        ],
    };
    serde_json::to_string(&envelope).map_err(|e| PipelineError::Encode(e.to_string()))
}

fn decode_payload(payload: Vec<JSValue>) -> Result<PipelineRequest, String> {
    let [dataset, boundaries, weightings, excluded]: [JSValue; 4] = payload
        .try_into()
        .map_err(|p: Vec<JSValue>| format!("expected 4 payload items, got {}", p.len()))?;
    let dataset: Dataset = serde_json::from_value(dataset).map_err(|e| e.to_string())?;
    let boundaries: Boundaries = serde_json::from_value(boundaries).map_err(|e| e.to_string())?;
    let weightings: Weightings = serde_json::from_value(weightings).map_err(|e| e.to_string())?;
    let excluded_fields: Vec<String> = serde_json::from_value(excluded).map_err(|e| e.to_string())?;
    Ok(PipelineRequest {
        dataset: Arc::new(dataset),
        boundaries: Arc::new(boundaries),
        weightings,
        excluded_fields,
    })
}

fn answer(envelope: RequestEnvelope) -> Result<JSValue, String> {
    if envelope.operation != RANK_OPERATION {
        return Err("unrecognised operation".to_string());
    }
    let request = decode_payload(envelope.payload)?;
    let derived = panic::catch_unwind(AssertUnwindSafe(|| run_pipeline(&request)))
        .map_err(|_| "the computation panicked".to_string())?;
    serde_json::to_value(&derived).map_err(|e| e.to_string())
}

/// Worker side: answers one request envelope.
///
/// Never fails: every problem is reported in the `error` field of the response.
pub fn handle_request(text: &str) -> String {
    let (id, operation, outcome) = match serde_json::from_str::<RequestEnvelope>(text) {
        Ok(envelope) => {
            let id = envelope.id;
            let operation = envelope.operation.clone();
            debug!("handle_request: {} {}", id, operation);
            (id, operation, answer(envelope))
        }
        Err(e) => {
            // Salvage the id so that the caller can release the request.
            let id = serde_json::from_str::<JSValue>(text)
                .ok()
                .and_then(|v| v["id"].as_u64())
                .unwrap_or(0);
            (id, String::new(), Err(format!("malformed request: {}", e)))
        }
    };
    let response = match outcome {
        Ok(result) => ResponseEnvelope {
            id,
            operation,
            result: Some(result),
            error: None,
        },
        Err(msg) => {
            error!("handle_request: request {} failed: {}", id, msg);
            ResponseEnvelope {
                id,
                operation,
                result: None,
                error: Some(msg),
            }
        }
    };
    match serde_json::to_string(&response) {
        Ok(s) => s,
        Err(e) => format!(
            r#"{{"id":{},"operationName":"","error":"could not encode the response: {}"}}"#,
            id, e
        ),
    }
}

/// Caller side: reads one response envelope.
///
/// An undecodable envelope is an error of its own (no request id can be trusted).
pub fn decode_response(text: &str) -> Result<(RequestId, Result<Derived, PipelineError>), PipelineError> {
    let envelope: ResponseEnvelope =
        serde_json::from_str(text).map_err(|e| PipelineError::Decode(e.to_string()))?;
    let outcome = match (envelope.error, envelope.result) {
        (Some(msg), _) => Err(PipelineError::Worker(msg)),
        (None, Some(result)) => {
            serde_json::from_value::<Derived>(result).map_err(|e| PipelineError::Decode(e.to_string()))
        }
        (None, None) => Err(PipelineError::Decode("empty response".to_string())),
    };
    Ok((envelope.id, outcome))
}
