//! Collector HTTP surface.
//!
//! Probes POST encoded reports to the publish endpoint; the auth
//! middleware rejects bad credentials before any decoding happens. The
//! details endpoint identifies this process, and the topology endpoint
//! serves rendered node detail to clients.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use periscope_report::codec;
use periscope_report::xfer::{self, Details};

use crate::render;
use crate::render::summary::BasicSummarizer;
use crate::store::ReportStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    /// Expected probe token; empty means unauthenticated dev mode.
    pub probe_token: String,
    pub id: String,
    pub version: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(xfer::DETAILS_PATH, get(get_details))
        .route(xfer::REPORT_PATH, post(receive_report))
        .route("/api/topology/{topology_id}/{node_id}", get(get_node))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, require_probe_auth))
}

/// Publish-endpoint auth: exact Authorization value plus a present probe
/// identity header, checked before the body is touched.
async fn require_probe_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.uri().path() != xfer::REPORT_PATH || state.probe_token.is_empty() {
        return Ok(next.run(req).await);
    }

    let expected = xfer::authorization_value(&state.probe_token);
    let ok = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);
    if !ok {
        warn!("rejected publish with bad authorization");
        return Err(StatusCode::UNAUTHORIZED);
    }
    if req.headers().get(xfer::PROBE_ID_HEADER).is_none() {
        warn!("rejected publish without probe identity");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

async fn receive_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let probe_id = headers
        .get(xfer::PROBE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let encoding = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok());

    match codec::decode_body(&body, encoding) {
        Ok(report) => {
            state.store.add(probe_id, report);
            StatusCode::OK
        }
        Err(e) => {
            // Partial reports are never merged.
            warn!("discarding undecodable report from probe {probe_id}: {e}");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn get_details(State(state): State<AppState>) -> Json<Details> {
    Json(Details {
        id: state.id.clone(),
        version: state.version.clone(),
    })
}

async fn get_node(
    State(state): State<AppState>,
    Path((topology_id, node_id)): Path<(String, String)>,
) -> Result<Json<render::DetailNode>, StatusCode> {
    let report = state.store.latest();
    let node = report
        .topology(&topology_id)
        .and_then(|t| t.nodes.get(&node_id))
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    let nodes = report.all_nodes();
    Ok(Json(render::make_node(
        &topology_id,
        &report,
        &nodes,
        &node,
        &BasicSummarizer,
    )))
}
