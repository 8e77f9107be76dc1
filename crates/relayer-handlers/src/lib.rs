// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Relayer handlers for HTTP calls
//!
//! Every route lives under `/api/v1`: key management, oracle queries,
//! submitted transactions per direction, relayer information and metrics.
//! With the embedded oracle the lock and burn actions of its executor are
//! served too.

#![warn(missing_docs)]
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use bridge_oracle::{BridgeActions, OracleQuery};
use bridge_relayer_context::RelayerContext;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Module handles relayer API
pub mod routes;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    /// The relayer context.
    pub ctx: RelayerContext,
    /// Where oracle queries are answered.
    pub oracle: Arc<dyn OracleQuery>,
    /// The executor actions, when it runs inside the relayer.
    pub bridge: Option<Arc<dyn BridgeActions>>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState").field("ctx", &self.ctx).finish()
    }
}

/// The `/api/v1` routes.
pub fn build_api() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/keys/import", post(routes::keys::handle_import_key))
        .route("/unlock", post(routes::keys::handle_unlock))
        .route("/lock", post(routes::keys::handle_lock))
        .route("/validators", get(routes::oracle::handle_validators))
        .route(
            "/validators/total-power",
            get(routes::oracle::handle_total_power),
        )
        .route(
            "/consensus-threshold",
            get(routes::oracle::handle_consensus_threshold),
        )
        .route("/prophecy/:claim_id", get(routes::oracle::handle_prophecy))
        .route("/bridge/lock", post(routes::bridge::handle_lock))
        .route("/bridge/burn", post(routes::bridge::handle_burn))
        .route(
            "/submissions/:direction",
            get(routes::submissions::handle_submissions),
        )
        .route("/info", get(routes::info::handle_relayer_info))
        .route("/metrics", get(routes::metric::handle_metric_info))
}

/// The whole HTTP application.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", build_api())
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
