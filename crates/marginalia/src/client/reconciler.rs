//! Optimistic annotation reconciler
//!
//! Holds a client's local view of one document's annotations. Mutations are
//! applied to the view at once and tracked as pending operations, each with
//! the snapshot it would roll back to. Settling an operation with the
//! server's answer either confirms it or rolls the view back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{normalize_visibility, AnnotationKind, AnnotationPatch, AnnotationView, NewAnnotation};
use crate::security::Role;

/// Prefix of ids synthesised for records the server has not confirmed yet
pub const PROVISIONAL_PREFIX: &str = "local-";

pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

/// Handle for one pending optimistic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

/// A new annotation as composed on the client
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    pub kind: AnnotationKind,
    pub payload: Value,
    pub is_private: bool,
    pub visibility: Vec<Role>,
}

impl AnnotationDraft {
    pub fn new(kind: AnnotationKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            is_private: true,
            visibility: Vec::new(),
        }
    }

    /// Share with the given roles
    pub fn shared_with(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.is_private = false;
        self.visibility = roles.into_iter().collect();
        self
    }

    pub fn to_request(&self) -> NewAnnotation {
        NewAnnotation {
            kind: Some(self.kind.to_string()),
            payload: Some(self.payload.clone()),
            is_private: self.is_private,
            visibility: self.visibility.clone(),
        }
    }
}

/// How a pending operation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The server accepted the operation. `record` is the authoritative
    /// record, or `None` for a delete.
    Confirmed {
        ticket: Ticket,
        record: Option<AnnotationView>,
    },
    /// The server refused the operation and the view was rolled back.
    /// `restored` is the record as it now stands locally, if any.
    RolledBack {
        ticket: Ticket,
        restored: Option<AnnotationView>,
        error: ApiError,
    },
}

impl Settlement {
    pub fn ticket(&self) -> Ticket {
        match self {
            Settlement::Confirmed { ticket, .. } | Settlement::RolledBack { ticket, .. } => *ticket,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Settlement::Confirmed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("annotation {0} is not confirmed by the server yet")]
    Unconfirmed(String),

    #[error("annotation {0} is not in the local view")]
    UnknownRecord(String),

    #[error("no pending operation for ticket {0}")]
    UnknownTicket(Ticket),

    #[error("server reply for ticket {0} carried no record")]
    MissingRecord(Ticket),
}

#[derive(Debug, Clone)]
struct PendingOp {
    ticket: Ticket,
    kind: OpKind,
    /// Provisional id for creates, server id otherwise
    record_id: String,
    /// State immediately before this op; `None` for creates
    prior: Option<AnnotationView>,
    /// A later op on the same record was confirmed first; settling this
    /// one leaves the view and the other snapshots alone
    superseded: bool,
}

/// Local optimistic view of one document's annotations
#[derive(Debug)]
pub struct Reconciler {
    document_id: String,
    owner: Role,
    records: Vec<AnnotationView>,
    pending: Vec<PendingOp>,
    next_ticket: u64,
}

fn view_order(a: &AnnotationView, b: &AnnotationView) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

impl Reconciler {
    pub fn new(document_id: impl Into<String>, owner: Role) -> Self {
        Self {
            document_id: document_id.into(),
            owner,
            records: Vec::new(),
            pending: Vec::new(),
            next_ticket: 1,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Current view, oldest first
    pub fn records(&self) -> &[AnnotationView] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&AnnotationView> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_kind(&self, ticket: Ticket) -> Option<OpKind> {
        self.pending.iter().find(|op| op.ticket == ticket).map(|op| op.kind)
    }

    /// Replace the confirmed part of the view with a server listing.
    /// Records still awaiting their create stay in place.
    pub fn load(&mut self, records: Vec<AnnotationView>) {
        let provisional: Vec<AnnotationView> = self
            .records
            .drain(..)
            .filter(|r| is_provisional_id(&r.id))
            .collect();
        self.records = records;
        self.records.sort_by(view_order);
        self.records.extend(provisional);
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn insert_sorted(&mut self, record: AnnotationView) {
        let at = self
            .records
            .partition_point(|r| view_order(r, &record) != std::cmp::Ordering::Greater);
        self.records.insert(at, record);
    }

    fn put_record(&mut self, record: AnnotationView) {
        match self.position(&record.id) {
            Some(i) => self.records[i] = record,
            None => self.insert_sorted(record),
        }
    }

    fn check_mutable(&self, id: &str) -> Result<usize, ReconcileError> {
        if is_provisional_id(id) {
            return Err(ReconcileError::Unconfirmed(id.to_string()));
        }
        self.position(id)
            .ok_or_else(|| ReconcileError::UnknownRecord(id.to_string()))
    }

    /// Insert a provisional record for a create about to be sent
    pub fn begin_create(&mut self, draft: &AnnotationDraft, now: DateTime<Utc>) -> Ticket {
        let ticket = self.issue_ticket();
        let id = format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4());
        let record = AnnotationView {
            id: id.clone(),
            document_id: self.document_id.clone(),
            created_by: self.owner,
            kind: draft.kind,
            payload: draft.payload.clone(),
            is_private: draft.is_private,
            visibility: normalize_visibility(self.owner, draft.visibility.iter().copied()),
            created_at: now,
            updated_at: now,
        };
        self.insert_sorted(record);
        self.pending.push(PendingOp {
            ticket,
            kind: OpKind::Create,
            record_id: id,
            prior: None,
            superseded: false,
        });
        ticket
    }

    /// The provisional id behind a pending create
    pub fn provisional_id(&self, ticket: Ticket) -> Option<&str> {
        self.pending
            .iter()
            .find(|op| op.ticket == ticket && op.kind == OpKind::Create)
            .map(|op| op.record_id.as_str())
    }

    /// Apply a patch locally ahead of the server
    pub fn begin_update(
        &mut self,
        id: &str,
        patch: &AnnotationPatch,
        now: DateTime<Utc>,
    ) -> Result<Ticket, ReconcileError> {
        let index = self.check_mutable(id)?;
        let prior = self.records[index].clone();
        patch.apply_to_view(&mut self.records[index], now);

        let ticket = self.issue_ticket();
        self.pending.push(PendingOp {
            ticket,
            kind: OpKind::Update,
            record_id: id.to_string(),
            prior: Some(prior),
            superseded: false,
        });
        Ok(ticket)
    }

    /// Remove a record locally ahead of the server
    pub fn begin_delete(&mut self, id: &str) -> Result<Ticket, ReconcileError> {
        let index = self.check_mutable(id)?;
        let prior = self.records.remove(index);

        let ticket = self.issue_ticket();
        self.pending.push(PendingOp {
            ticket,
            kind: OpKind::Delete,
            record_id: id.to_string(),
            prior: Some(prior),
            superseded: false,
        });
        Ok(ticket)
    }

    /// Index (in `pending`) of the next op on the same record, if any
    fn next_on_record(&self, after: usize, record_id: &str) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .skip(after)
            .find(|(_, op)| op.record_id == record_id)
            .map(|(i, _)| i)
    }

    /// Resolve a pending operation with the server's answer. A successful
    /// create or update must carry the server record; a delete carries none.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        result: Result<Option<AnnotationView>, ApiError>,
    ) -> Result<Settlement, ReconcileError> {
        let index = self
            .pending
            .iter()
            .position(|op| op.ticket == ticket)
            .ok_or(ReconcileError::UnknownTicket(ticket))?;

        if let Ok(None) = &result {
            if self.pending[index].kind != OpKind::Delete {
                return Err(ReconcileError::MissingRecord(ticket));
            }
        }

        let op = self.pending.remove(index);
        let later = self.next_on_record(index, &op.record_id);

        let settlement = match result {
            Ok(record) => {
                self.confirm(&op, index, later, record.clone());
                Settlement::Confirmed { ticket, record }
            }
            Err(error) => {
                let restored = self.roll_back(op, later);
                Settlement::RolledBack {
                    ticket,
                    restored,
                    error,
                }
            }
        };
        Ok(settlement)
    }

    fn confirm(
        &mut self,
        op: &PendingOp,
        index: usize,
        later: Option<usize>,
        record: Option<AnnotationView>,
    ) {
        // A newer confirmation already owns the record and the chain
        if op.superseded {
            return;
        }
        // Earlier ops on this record must no longer restore over it
        for earlier in self.pending[..index].iter_mut() {
            if earlier.record_id == op.record_id {
                earlier.superseded = true;
            }
        }

        match (op.kind, record) {
            (OpKind::Create, Some(record)) => {
                // Swap the provisional record for the server's, in place
                match self.position(&op.record_id) {
                    Some(i) => self.records[i] = record,
                    None => self.insert_sorted(record),
                }
            }
            (OpKind::Update, Some(record)) => match later {
                Some(next) => self.pending[next].prior = Some(record),
                None => {
                    if self.position(&record.id).is_some() {
                        self.put_record(record);
                    }
                }
            },
            _ => {}
        }
    }

    fn roll_back(&mut self, op: PendingOp, later: Option<usize>) -> Option<AnnotationView> {
        match op.kind {
            OpKind::Create => {
                if let Some(i) = self.position(&op.record_id) {
                    self.records.remove(i);
                }
                None
            }
            OpKind::Update | OpKind::Delete => {
                if op.superseded {
                    return self.get(&op.record_id).cloned();
                }
                if let Some(next) = later {
                    // The next op now rolls back to what preceded this one
                    self.pending[next].prior = op.prior;
                } else if let Some(prior) = op.prior {
                    self.put_record(prior);
                }
                self.get(&op.record_id).cloned()
            }
        }
    }
}
