//! HTTP surface: router construction and request handlers.
//!
//! Handlers orchestrate; the stores and the face engine do the work. The
//! enrollment and authentication flows (decode → extract → persist/match)
//! live in `register_face` and `login_face`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use comanda_core::{Matcher, NearestMatcher};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{
    AckResponse, ApiError, FaceLoginRequest, FaceLoginResponse, FaceRegisterRequest,
    FaceRegisterResponse, ItemsQuery, ObservationsUpdate, SavedBatchResponse,
};
use crate::credentials;
use crate::engine::Embedder;
use crate::inventory::{Approval, BatchItemRecord, CatalogItem, InventoryStore, NewBatchItem};
use crate::store::{ChefRecord, ChefStore, NewChef};

#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub chefs: Arc<dyn ChefStore>,
    pub inventory: Arc<InventoryStore>,
    pub match_threshold: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/items", get(search_items))
        .route("/chefs", get(chef_roster))
        .route("/batches", post(save_batch))
        .route("/batches/recent", get(recent_batches))
        .route("/batch_items/approve", put(approve_items))
        .route("/batch_items/:id/sent", put(mark_sent))
        .route("/batch_items/:id/observations", put(update_observations))
        .route("/batch_items/:id", delete(delete_item))
        .route("/faces/register", post(register_face))
        .route("/faces/login", post(login_face))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Enrollment flow: decode → extract → upsert.
async fn register_face(
    State(state): State<AppState>,
    Json(req): Json<FaceRegisterRequest>,
) -> Result<Json<FaceRegisterResponse>, ApiError> {
    let embedding = state.embedder.embed(&req.image_base64).await?;
    let secret = credentials::hash_secret(&req.secret);

    state
        .chefs
        .upsert(&NewChef {
            collaborator_id: req.collaborator_id,
            display_name: req.display_name,
            secret_hash: secret.digest,
            secret_salt: secret.salt,
            embedding,
        })
        .await
        .map_err(|e| ApiError::from_store(e, "error registering chef"))?;

    tracing::info!(collaborator_id = req.collaborator_id, "chef enrolled");
    Ok(Json(FaceRegisterResponse {
        status: "success",
        message: format!("chef {} enrolled with face", req.collaborator_id),
    }))
}

/// Authentication flow: decode → extract → fetch candidates → match.
async fn login_face(
    State(state): State<AppState>,
    Json(req): Json<FaceLoginRequest>,
) -> Result<Json<FaceLoginResponse>, ApiError> {
    let probe = state.embedder.embed(&req.image_base64).await?;
    let roster = state
        .chefs
        .list_enrolled()
        .await
        .map_err(|e| ApiError::from_store(e, "error fetching records"))?;

    let found = NearestMatcher
        .identify(&probe, &roster, state.match_threshold)
        .ok_or(ApiError::FaceNotRecognized)?;

    tracing::info!(
        collaborator_id = found.collaborator_id,
        distance = found.distance,
        candidates = roster.len(),
        "face login accepted"
    );
    Ok(Json(FaceLoginResponse {
        collaborator_id: found.collaborator_id,
        display_name: found.display_name,
        is_admin: found.is_admin,
    }))
}

async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    let term = query.search_term.unwrap_or_default();
    state
        .inventory
        .search_items(&term, query.limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(e, "error searching catalog"))
}

async fn chef_roster(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChefRecord>>, ApiError> {
    state
        .chefs
        .roster()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(e, "error fetching chefs"))
}

async fn save_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<NewBatchItem>>,
) -> Result<Json<SavedBatchResponse>, ApiError> {
    let batch_id = state
        .inventory
        .save_batch(&items)
        .await
        .map_err(|e| ApiError::from_store(e, "error saving batch"))?;
    Ok(Json(SavedBatchResponse {
        batch_id,
        message: "batch saved".to_string(),
    }))
}

async fn recent_batches(
    State(state): State<AppState>,
) -> Result<Json<Vec<BatchItemRecord>>, ApiError> {
    state
        .inventory
        .recent_batches()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(e, "error fetching records"))
}

async fn mark_sent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .inventory
        .mark_sent(id)
        .await
        .map_err(|e| ApiError::from_store(e, "error updating record"))?;
    Ok(Json(AckResponse { message: "record marked as sent" }))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .inventory
        .delete_item(id)
        .await
        .map_err(|e| ApiError::from_store(e, "error deleting record"))?;
    Ok(Json(AckResponse { message: "record deleted" }))
}

async fn approve_items(
    State(state): State<AppState>,
    Json(approvals): Json<Vec<Approval>>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .inventory
        .approve(&approvals)
        .await
        .map_err(|e| ApiError::from_store(e, "error approving records"))?;
    Ok(Json(AckResponse { message: "records approved" }))
}

async fn update_observations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ObservationsUpdate>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .inventory
        .update_observations(id, update.observations.as_deref())
        .await
        .map_err(|e| ApiError::from_store(e, "error updating observations"))?;
    Ok(Json(AckResponse { message: "observations updated" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use comanda_core::{DecodeError, Embedding, EnrolledChef, PipelineError, EMBEDDING_DIM};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Deterministic stand-in for the ONNX pipeline. Test payloads put the
    /// embedding's leading component after the comma, so distances between
    /// photos are chosen per test; `noface` simulates a faceless photo.
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, payload: &str) -> Result<Embedding, EngineError> {
            let Some((_, directive)) = payload.split_once(',') else {
                return Err(EngineError::Decode(DecodeError::MissingSeparator));
            };
            if directive == "noface" {
                return Err(EngineError::Pipeline(PipelineError::NoFaceDetected));
            }
            let lead: f64 = directive.parse().expect("test payload must be numeric");
            let mut values = vec![0.0; EMBEDDING_DIM];
            values[0] = lead;
            Ok(Embedding { values })
        }
    }

    #[derive(Default)]
    struct MemoryChefStore {
        rows: Mutex<BTreeMap<i32, NewChef>>,
    }

    impl MemoryChefStore {
        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        fn embedding_of(&self, id: i32) -> Option<Embedding> {
            self.rows.lock().unwrap().get(&id).map(|c| c.embedding.clone())
        }
    }

    #[async_trait]
    impl ChefStore for MemoryChefStore {
        async fn list_enrolled(&self) -> Result<Vec<EnrolledChef>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .map(|c| EnrolledChef {
                    collaborator_id: c.collaborator_id,
                    display_name: c.display_name.clone(),
                    is_admin: false,
                    embedding: c.embedding.clone(),
                })
                .collect())
        }

        async fn upsert(&self, chef: &NewChef) -> Result<(), StoreError> {
            self.rows
                .lock()
                .unwrap()
                .insert(chef.collaborator_id, chef.clone());
            Ok(())
        }

        async fn roster(&self) -> Result<Vec<ChefRecord>, StoreError> {
            let mut records: Vec<ChefRecord> = self
                .rows
                .lock()
                .unwrap()
                .values()
                .map(|c| ChefRecord {
                    collaborator_id: c.collaborator_id,
                    display_name: c.display_name.clone(),
                    is_admin: false,
                })
                .collect();
            records.sort_by(|a, b| a.display_name.cmp(&b.display_name));
            Ok(records)
        }
    }

    fn test_app() -> (Router, Arc<MemoryChefStore>) {
        let chefs = Arc::new(MemoryChefStore::default());
        // Lazy pools: never connected, the inventory endpoints are not
        // exercised in these tests.
        let inventory = Arc::new(InventoryStore::new(
            sqlx::postgres::PgPool::connect_lazy("postgres://test@localhost/test_ops").unwrap(),
            sqlx::postgres::PgPool::connect_lazy("postgres://test@localhost/test_catalog")
                .unwrap(),
            "UTC".to_string(),
        ));
        let state = AppState {
            embedder: Arc::new(FakeEmbedder),
            chefs: chefs.clone(),
            inventory,
            match_threshold: comanda_core::MATCH_THRESHOLD,
        };
        (router(state), chefs)
    }

    async fn send_json(
        app: &Router,
        method: &str,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn register_body(id: i32, name: &str, payload: &str) -> Value {
        json!({
            "image_base64": payload,
            "display_name": name,
            "secret": "kitchen-pass",
            "collaborator_id": id,
        })
    }

    #[tokio::test]
    async fn test_enroll_then_login_round_trip() {
        let (app, _) = test_app();

        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/register",
            register_body(42, "ana", "data:image/png;base64,0.125"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "data:image/png;base64,0.125" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collaborator_id"], 42);
        assert_eq!(body["display_name"], "ana");
        assert_eq!(body["is_admin"], false);
    }

    #[tokio::test]
    async fn test_enroll_twice_leaves_one_record() {
        let (app, chefs) = test_app();

        for _ in 0..2 {
            let (status, _) = send_json(
                &app,
                "POST",
                "/faces/register",
                register_body(7, "benito", "data:image/png;base64,0.5"),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(chefs.row_count(), 1);
        let stored = chefs.embedding_of(7).unwrap();
        assert_eq!(stored.values[0], 0.5);
    }

    #[tokio::test]
    async fn test_login_with_empty_roster_is_not_found() {
        let (app, _) = test_app();
        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "data:image/png;base64,0.1" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "face not recognized");
    }

    #[tokio::test]
    async fn test_login_outside_threshold_is_not_found() {
        let (app, _) = test_app();
        send_json(
            &app,
            "POST",
            "/faces/register",
            register_body(1, "ana", "data:image/png;base64,0.1"),
        )
        .await;

        // Distance 0.8 from the only enrolled embedding.
        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "data:image/png;base64,0.9" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "face not recognized");
    }

    #[tokio::test]
    async fn test_login_picks_nearest_enrolled_chef() {
        let (app, _) = test_app();
        for (id, name, lead) in [(1, "ana", "0.0"), (2, "benito", "0.5"), (3, "carla", "2.0")] {
            send_json(
                &app,
                "POST",
                "/faces/register",
                register_body(id, name, &format!("data:image/png;base64,{lead}")),
            )
            .await;
        }

        // Probe at 0.45: distances 0.45 / 0.05 / 1.55 — benito wins.
        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "data:image/png;base64,0.45" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collaborator_id"], 2);
    }

    #[tokio::test]
    async fn test_register_rejects_payload_without_separator() {
        let (app, chefs) = test_app();
        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/register",
            register_body(9, "dario", "not-a-data-uri"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "error processing image");
        assert_eq!(chefs.row_count(), 0);
    }

    #[tokio::test]
    async fn test_login_rejects_payload_without_separator() {
        let (app, _) = test_app();
        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "not-a-data-uri" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "error processing image");
    }

    #[tokio::test]
    async fn test_faceless_photo_is_client_error_on_both_flows() {
        let (app, _) = test_app();

        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/register",
            register_body(5, "elia", "data:image/png;base64,noface"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "error processing image");

        let (status, body) = send_json(
            &app,
            "POST",
            "/faces/login",
            json!({ "image_base64": "data:image/png;base64,noface" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "error processing image");
    }

    #[tokio::test]
    async fn test_roster_excludes_credential_material() {
        let (app, _) = test_app();
        send_json(
            &app,
            "POST",
            "/faces/register",
            register_body(3, "carla", "data:image/png;base64,0.3"),
        )
        .await;

        let (status, body) = get_json(&app, "/chefs").await;
        assert_eq!(status, StatusCode::OK);
        let chefs = body.as_array().unwrap();
        assert_eq!(chefs.len(), 1);
        assert_eq!(chefs[0]["display_name"], "carla");
        assert!(chefs[0].get("secret_hash").is_none());
        assert!(chefs[0].get("secret_salt").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
