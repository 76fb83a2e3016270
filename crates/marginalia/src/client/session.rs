//! Optimistic session
//!
//! Drives begin, call and settle for one client against an `AnnotationApi`.
//! The local view changes before the call is made and is reconciled with
//! whatever the server answers.

use chrono::Utc;

use super::api::AnnotationApi;
use super::reconciler::{AnnotationDraft, ReconcileError, Reconciler, Settlement, Ticket};
use crate::error::ApiError;
use crate::models::{AnnotationPatch, AnnotationView};

pub struct OptimisticSession<A: AnnotationApi> {
    api: A,
    view: Reconciler,
}

impl<A: AnnotationApi> OptimisticSession<A> {
    pub fn new(api: A, document_id: impl Into<String>) -> Self {
        let view = Reconciler::new(document_id, api.role());
        Self { api, view }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Current local view, oldest first
    pub fn records(&self) -> &[AnnotationView] {
        self.view.records()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.view
    }

    /// Reload the confirmed records from the server
    pub async fn refresh(&mut self) -> Result<usize, ApiError> {
        let records = self.api.list(self.view.document_id()).await?;
        let count = records.len();
        self.view.load(records);
        Ok(count)
    }

    pub async fn create(&mut self, draft: AnnotationDraft) -> Result<Settlement, ReconcileError> {
        let ticket = self.view.begin_create(&draft, Utc::now());
        let result = self
            .api
            .create(self.view.document_id(), &draft.to_request())
            .await
            .map(Some);
        self.settle(ticket, result)
    }

    pub async fn update(
        &mut self,
        id: &str,
        patch: AnnotationPatch,
    ) -> Result<Settlement, ReconcileError> {
        let ticket = self.view.begin_update(id, &patch, Utc::now())?;
        let result = self.api.update(id, &patch).await.map(Some);
        self.settle(ticket, result)
    }

    pub async fn delete(&mut self, id: &str) -> Result<Settlement, ReconcileError> {
        let ticket = self.view.begin_delete(id)?;
        let result = self.api.delete(id).await.map(|_| None);
        self.settle(ticket, result)
    }

    fn settle(
        &mut self,
        ticket: Ticket,
        result: Result<Option<AnnotationView>, ApiError>,
    ) -> Result<Settlement, ReconcileError> {
        let settlement = self.view.settle(ticket, result)?;
        if let Settlement::RolledBack { error, .. } = &settlement {
            tracing::debug!(%ticket, code = %error.code, "optimistic operation rolled back");
        }
        Ok(settlement)
    }
}
