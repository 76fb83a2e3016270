//! Optimistic client against a live server on a loopback port

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use marginalia::client::{
    AnnotationDraft, HttpAnnotationClient, OptimisticSession, Settlement,
};
use marginalia::models::{AnnotationKind, AnnotationPatch, BlobRef, FileRecord, StoredBlob};
use marginalia::storage::MemoryStorage;
use marginalia::{configure, AppState, LibraryConfig, Role, Storage};

async fn serve(storage: Storage) -> SocketAddr {
    let state = Arc::new(AppState::new(storage, LibraryConfig::default()));
    let app = configure(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn seed_document(storage: &Storage) -> String {
    let blob = StoredBlob {
        blob_ref: BlobRef::new(),
        size: 8,
        sha256: String::new(),
    };
    storage
        .catalog
        .insert(FileRecord::new("brief.pdf".into(), Role::Admin, "application/pdf", &blob))
        .await
        .unwrap()
        .id_hex()
}

fn session(addr: SocketAddr, doc: &str, role: Role) -> OptimisticSession<HttpAnnotationClient> {
    let client = HttpAnnotationClient::new(format!("http://{}", addr), role);
    OptimisticSession::new(client, doc)
}

#[tokio::test]
async fn test_create_update_delete_over_http() {
    let storage = MemoryStorage::new().storage();
    let doc = seed_document(&storage).await;
    let addr = serve(storage).await;

    let mut doer = session(addr, &doc, Role::DoerA);
    let draft = AnnotationDraft::new(AnnotationKind::Highlight, json!({"page": 3}))
        .shared_with(vec![Role::Reader]);
    let id = match doer.create(draft).await.unwrap() {
        Settlement::Confirmed { record: Some(record), .. } => record.id,
        other => panic!("unexpected {:?}", other),
    };
    assert!(!id.starts_with("local-"));

    let patch = AnnotationPatch {
        payload: Some(json!({"page": 4})),
        ..AnnotationPatch::default()
    };
    assert!(doer.update(&id, patch).await.unwrap().is_confirmed());
    assert_eq!(doer.records()[0].payload["page"], 4);

    let mut reader = session(addr, &doc, Role::Reader);
    assert_eq!(reader.refresh().await.unwrap(), 1);

    assert!(doer.delete(&id).await.unwrap().is_confirmed());
    assert!(doer.records().is_empty());
    assert_eq!(reader.refresh().await.unwrap(), 0);
}

#[tokio::test]
async fn test_server_rejection_rolls_back_with_error_code() {
    let storage = MemoryStorage::new().storage();
    let doc = seed_document(&storage).await;
    let addr = serve(storage).await;

    let mut reader = session(addr, &doc, Role::Reader);
    let draft = AnnotationDraft::new(AnnotationKind::Comment, json!({"page": 1, "text": "no"}));
    match reader.create(draft).await.unwrap() {
        Settlement::RolledBack { restored, error, .. } => {
            assert!(restored.is_none());
            assert_eq!(error.code, "FORBIDDEN");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(reader.records().is_empty());

    let mut doer = session(addr, "0123456789abcdef01234567", Role::DoerB);
    let draft = AnnotationDraft::new(AnnotationKind::Comment, json!({"page": 1}));
    match doer.create(draft).await.unwrap() {
        Settlement::RolledBack { error, .. } => assert_eq!(error.code, "DOCUMENT_NOT_FOUND"),
        other => panic!("unexpected {:?}", other),
    }
}
