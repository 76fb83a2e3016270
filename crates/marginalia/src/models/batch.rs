//! Bulk upload outcome model

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::DocumentSummary;
use crate::error::{ApiError, LibraryError};

/// Outcome for one file of a bulk upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        file_name: String,
        document: DocumentSummary,
    },
    #[serde(rename_all = "camelCase")]
    Rejected { file_name: String, error: ApiError },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded { .. })
    }

    pub fn file_name(&self) -> &str {
        match self {
            FileOutcome::Succeeded { file_name, .. } | FileOutcome::Rejected { file_name, .. } => {
                file_name
            }
        }
    }
}

/// Overall batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Complete,
    Partial,
    Failed,
}

/// Per-file outcome list, in submission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub status: BatchStatus,
    pub succeeded: usize,
    pub rejected: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<FileOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let rejected = outcomes.len() - succeeded;
        let status = match (succeeded, rejected) {
            (_, 0) if succeeded > 0 => BatchStatus::Complete,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        };
        Self {
            status,
            succeeded,
            rejected,
            outcomes,
        }
    }

    /// Mixed results are reported as `PartialBatchFailure`, which is not a
    /// failure of the whole call.
    pub fn partial_failure(&self) -> Option<LibraryError> {
        (self.status == BatchStatus::Partial).then(|| LibraryError::PartialBatchFailure {
            succeeded: self.succeeded,
            rejected: self.rejected,
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            BatchStatus::Complete => StatusCode::CREATED,
            BatchStatus::Partial => StatusCode::MULTI_STATUS,
            BatchStatus::Failed => StatusCode::BAD_REQUEST,
        }
    }
}
