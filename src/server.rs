// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Bench HTTP Surface
 * Read the shared object, mutate it through key paths, query the time helper
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::assign::AssignmentOutcome;
use crate::config::AppConfig;
use crate::helper::{HelperStatus, TimeHelper};
use crate::store::StateStore;

/// Shared handler state, passed by reference instead of living in a global
pub struct AppState {
    pub store: Arc<StateStore>,
    pub helper: Arc<TimeHelper>,
}

/// Response body for mutation requests: one entry per submitted key, in
/// document order, nothing silently swallowed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub results: Vec<AssignmentOutcome>,
    pub applied_at: String,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dump_handler).post(mutate_handler))
        .route("/time", get(time_handler))
        .with_state(state)
}

/// GET / returns the shared object's own enumerable properties
async fn dump_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.store.dump())
}

/// POST / applies each body key as a deep assignment and reports per-key
/// outcomes. Malformed JSON never reaches here; the extractor rejects it.
async fn mutate_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> Json<MutationResponse> {
    let mut results = Vec::with_capacity(body.len());
    for (key, value) in body {
        results.push(state.store.apply(&key, value));
    }

    let rejected = results.iter().filter(|r| !r.is_accepted()).count();
    info!(
        applied = results.len() - rejected,
        rejected,
        policy = %state.store.policy(),
        "State mutation processed"
    );

    Json(MutationResponse {
        results,
        applied_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /time runs the bounded helper and maps its outcome to a status code
async fn time_handler(State(state): State<Arc<AppState>>) -> Response {
    let outcome = state.helper.run().await;
    let status = match outcome.status {
        HelperStatus::Success => StatusCode::OK,
        HelperStatus::Timeout => StatusCode::GATEWAY_TIMEOUT,
        HelperStatus::Saturated => StatusCode::SERVICE_UNAVAILABLE,
        HelperStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status != StatusCode::OK {
        warn!(
            status = ?outcome.status,
            error = outcome.error.as_deref().unwrap_or_default(),
            "Time helper run did not succeed"
        );
    }

    (status, Json(outcome)).into_response()
}

/// Build the application state from configuration and serve until shutdown
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(StateStore::with_limits(
        config.store.assignment_policy,
        config.store.max_auto_index,
    ));
    let helper = Arc::new(TimeHelper::new(&config.helper));
    let state = Arc::new(AppState { store, helper });
    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        policy = %config.store.assignment_policy,
        "Pollution bench listening"
    );

    if !config.server.graceful_shutdown {
        axum::serve(listener, router).await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let mut server_task = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Shutdown signal received, draining connections");
            let _ = shutdown_tx.send(());
        }
    }

    let drain = Duration::from_secs(config.server.shutdown_timeout_secs);
    match tokio::time::timeout(drain, &mut server_task).await {
        Ok(result) => result??,
        Err(_) => {
            warn!(
                drain_timeout_secs = drain.as_secs(),
                "Drain timeout exceeded, aborting server task"
            );
            server_task.abort();
        }
    }

    Ok(())
}
