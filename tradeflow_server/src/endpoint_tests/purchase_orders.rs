use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tf_common::Secret;
use tradeflow_engine::{
    db_types::{OrderStatus, Role},
    events::EventProducers,
    storage::LocalFileStorage,
    traits::{CatalogManagement, VerificationMode},
    AuditApi,
    PoWorkflowApi,
    SqliteDatabase,
    SqliteVerifier,
};

use super::helpers::{bearer, reload, seed_order, send_request, setup_db, ADMIN_ID, CLIENT_ID, OTHER_CLIENT_ID};
use crate::routes::{
    DocumentUrlRoute,
    GenerateSystemPoRoute,
    OrderAuditRoute,
    RejectClientPoRoute,
    SignedFileRoute,
    UploadClientPoRoute,
    VerifyClientPoRoute,
};

const URL_BASE: &str = "http://localhost:8460/files";
const PO_CONTENT: &[u8] = b"%PDF-1.4 purchase order for 3 widgets";

fn storage(dir: &TempDir) -> LocalFileStorage {
    LocalFileStorage::new(dir.path(), URL_BASE, Secret::new("document-links-test-key".to_string()))
}

fn configure(db: SqliteDatabase, storage: LocalFileStorage) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let verifier = db.verifier(VerificationMode::Atomic);
        let po_api = PoWorkflowApi::new(db.clone(), verifier, storage.clone(), EventProducers::default());
        let api_scope = web::scope("/api")
            .service(UploadClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(GenerateSystemPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(VerifyClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(RejectClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(DocumentUrlRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(OrderAuditRoute::<SqliteDatabase>::new());
        cfg.app_data(web::Data::new(po_api))
            .app_data(web::Data::new(AuditApi::new(db)))
            .app_data(web::Data::new(storage))
            .service(api_scope)
            .service(SignedFileRoute::<LocalFileStorage>::new());
    }
}

fn upload(order_id: i64, user_id: i64, role: Role, content: &str) -> TestRequest {
    TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/po"))
        .insert_header(bearer(user_id, role))
        .set_json(json!({ "file_name": "client po.pdf", "content": content }))
}

/// Uploads the PO as the client and returns the new document id.
async fn uploaded_po(db: &SqliteDatabase, storage: &LocalFileStorage, order_id: i64) -> i64 {
    let req = upload(order_id, CLIENT_ID, Role::Client, &base64::encode(PO_CONTENT));
    let (status, body) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    body["id"].as_i64().unwrap()
}

#[actix_web::test]
async fn client_uploads_a_po() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let (order, _) = seed_order(&db).await;
    let req = upload(order.id.value(), CLIENT_ID, Role::Client, &base64::encode(PO_CONTENT));
    let (status, body) = send_request(req, configure(db.clone(), storage(&dir))).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["document_type"], "CLIENT_PO");
    assert_eq!(body["uploaded_by"], CLIENT_ID);
    assert!(body["verified_at"].is_null());
    let file_ref = body["file_ref"].as_str().unwrap();
    assert!(file_ref.ends_with("_client_po.pdf"));
    assert_eq!(std::fs::read(dir.path().join(file_ref)).unwrap(), PO_CONTENT);
}

#[actix_web::test]
async fn uploads_must_be_base64() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let (order, _) = seed_order(&db).await;
    let req = upload(order.id.value(), CLIENT_ID, Role::Client, "this is not base64!");
    let (status, body) = send_request(req, configure(db.clone(), storage(&dir))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("base64"));
    assert!(!dir.path().join("orders").exists());
}

#[actix_web::test]
async fn clients_upload_for_their_own_orders_only() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let (order, _) = seed_order(&db).await;
    let req = upload(order.id.value(), OTHER_CLIENT_ID, Role::Client, &base64::encode(PO_CONTENT));
    let (status, _) = send_request(req, configure(db.clone(), storage(&dir))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = upload(order.id.value(), 200, Role::Supplier, &base64::encode(PO_CONTENT));
    let (status, _) = send_request(req, configure(db.clone(), storage(&dir))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!dir.path().join("orders").exists());
}

#[actix_web::test]
async fn verification_takes_stock_once() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, widget) = seed_order(&db).await;
    let document_id = uploaded_po(&db, &storage, order.id.value()).await;
    let path = format!("/api/documents/{document_id}/verify");

    let req = TestRequest::post().uri(&path).insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["already_verified"], false);
    assert_eq!(body["document_id"], document_id);
    assert_eq!(body["order"]["status"], "PENDING_PAYMENT");
    assert_eq!(body["stock_decrements"], json!([{ "product_id": widget.id, "quantity": 3 }]));

    let req = TestRequest::post().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["already_verified"], true);
    assert!(body.get("stock_decrements").is_none());

    let widget = db.fetch_product(widget.id).await.unwrap().unwrap();
    assert_eq!(widget.stock, Some(47));
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingPayment);
}

#[actix_web::test]
async fn verified_pos_cannot_be_rejected() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, _) = seed_order(&db).await;
    let document_id = uploaded_po(&db, &storage, order.id.value()).await;
    let req = TestRequest::post()
        .uri(&format!("/api/documents/{document_id}/verify"))
        .insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, _) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::post()
        .uri(&format!("/api/documents/{document_id}/reject"))
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "reason": "Too late" }));
    let (status, body) = send_request(req, configure(db, storage)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already been verified"));
}

#[actix_web::test]
async fn admin_rejects_a_po() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, _) = seed_order(&db).await;
    let document_id = uploaded_po(&db, &storage, order.id.value()).await;
    let req = TestRequest::post()
        .uri(&format!("/api/documents/{document_id}/reject"))
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "reason": "Unsigned" }));
    let (status, body) = send_request(req, configure(db.clone(), storage)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["rejection_reason"], "Unsigned");
    assert!(!body["rejected_at"].is_null());
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingAdminConfirmation);
}

#[actix_web::test]
async fn system_po_confirms_the_order_once() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, _) = seed_order(&db).await;
    let path = format!("/api/orders/{}/system_po", order.id.value());
    let req = TestRequest::post().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["already_verified"], false);
    assert_eq!(body["order"]["status"], "PENDING_PAYMENT");
    assert_eq!(body["order"]["system_po_generated"], true);

    let req = TestRequest::post().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db.clone(), storage)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["already_verified"], true);
}

#[actix_web::test]
async fn audit_trail_is_admin_only() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, _) = seed_order(&db).await;
    let document_id = uploaded_po(&db, &storage, order.id.value()).await;
    let req = TestRequest::post()
        .uri(&format!("/api/documents/{document_id}/verify"))
        .insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, _) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let path = format!("/api/orders/{}/audit", order.id.value());
    let req = TestRequest::get().uri(&path).insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db, storage)).await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<Value> = serde_json::from_str(&body).unwrap();
    let actions = entries.iter().filter_map(|e| e["action"].as_str()).collect::<Vec<_>>();
    assert!(actions.contains(&"CLIENT_PO_UPLOADED"), "{actions:?}");
    assert!(actions.contains(&"PO_VERIFIED"), "{actions:?}");
    assert!(actions.contains(&"CLIENT_PO_CONFIRMED"), "{actions:?}");
}

#[actix_web::test]
async fn signed_links_serve_the_file() {
    let db = setup_db().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = storage(&dir);
    let (order, _) = seed_order(&db).await;
    let document_id = uploaded_po(&db, &storage, order.id.value()).await;

    let req = TestRequest::get()
        .uri(&format!("/api/documents/{document_id}/url"))
        .insert_header(bearer(OTHER_CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get()
        .uri(&format!("/api/documents/{document_id}/url"))
        .insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, body) = send_request(req, configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    let url = body["url"].as_str().unwrap();
    let link = url.strip_prefix("http://localhost:8460").unwrap().to_string();
    assert!(link.starts_with("/files/orders/"));

    // No bearer token is needed to follow the link
    let (status, body) = send_request(TestRequest::get().uri(&link), configure(db.clone(), storage.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_bytes(), PO_CONTENT);

    let tampered = link.replace("signature=", "signature=00");
    let (status, _) = send_request(TestRequest::get().uri(&tampered), configure(db, storage)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
