//! Client side of the annotation API
//!
//! A `Reconciler` keeps the optimistic local view, `AnnotationApi` is the
//! transport seam, and `OptimisticSession` ties the two together.

pub mod api;
pub mod http;
pub mod reconciler;
pub mod session;

pub use api::{AnnotationApi, DirectAnnotationApi};
pub use http::HttpAnnotationClient;
pub use reconciler::{
    is_provisional_id, AnnotationDraft, OpKind, ReconcileError, Reconciler, Settlement, Ticket,
    PROVISIONAL_PREFIX,
};
pub use session::OptimisticSession;
