//! 路由配置
//!
//! /api 下的接口都要求 Bearer Token；/ws 在握手时自行认证；
//! /health 与 /ready 公开。

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use loyalty_shared::observability::middleware as obs_middleware;

use crate::handlers::{approval, award, card, health, notification, realtime};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// 积分发放路由
fn award_routes() -> Router<AppState> {
    Router::new().route("/award-points", post(award::award_points))
}

/// 审批路由
fn approval_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/approval-requests",
            post(approval::create_approval_request),
        )
        .route(
            "/approval-requests/pending",
            get(approval::list_pending_approvals),
        )
        .route(
            "/approval-requests/{id}",
            get(approval::get_approval_request),
        )
        .route(
            "/approval-requests/{id}/respond",
            put(approval::respond_to_approval),
        )
}

/// 通知路由
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/unread", get(notification::list_unread))
        .route("/notifications/pending", get(notification::list_pending))
        .route("/notifications/read-all", put(notification::mark_all_read))
        .route(
            "/notifications/preferences",
            get(notification::get_preferences).put(notification::update_preferences),
        )
        .route("/notifications/{id}/read", put(notification::mark_read))
}

/// 会员卡路由
fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/cards", get(card::list_cards))
        .route("/cards/{id}/transactions", get(card::list_transactions))
}

/// 需要认证的 API 路由
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(award_routes())
        .merge(approval_routes())
        .merge(notification_routes())
        .merge(card_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// 组装完整路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        .route("/ws", get(realtime::realtime_socket))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
