//! 通知处理器
//!
//! 通知只对顾客开放，所有操作都限定在调用方自己的通知范围内

use axum::{
    Json,
    extract::{Path, Query, State},
};
use loyalty_management::{Notification, NotificationPreferences};

use crate::auth::Principal;
use crate::dto::{
    ApiResponse, LimitQuery, MarkAllReadResponse, UpdatePreferencesBody, ValidatedJson,
};
use crate::error::ApiError;
use crate::state::AppState;

/// 最近的通知
///
/// GET /api/notifications?limit=
pub async fn list_notifications(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let notifications = state
        .services
        .fanout
        .list(customer_id, query.limit())
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

/// GET /api/notifications/unread
pub async fn list_unread(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let notifications = state.services.fanout.list_unread(customer_id).await?;
    Ok(Json(ApiResponse::success(notifications)))
}

/// 未读或等待处理的通知，客户端轮询使用
///
/// GET /api/notifications/pending
pub async fn list_pending(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let notifications = state.services.fanout.list_pending(customer_id).await?;
    Ok(Json(ApiResponse::success(notifications)))
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(notification_id): Path<i64>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let notification = state
        .services
        .fanout
        .mark_read(customer_id, notification_id)
        .await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<MarkAllReadResponse>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let updated = state.services.fanout.mark_all_read(customer_id).await?;
    Ok(Json(ApiResponse::success(MarkAllReadResponse { updated })))
}

/// GET /api/notifications/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<NotificationPreferences>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let preferences = state.services.fanout.get_preferences(customer_id).await?;
    Ok(Json(ApiResponse::success(preferences)))
}

/// PUT /api/notifications/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(body): ValidatedJson<UpdatePreferencesBody>,
) -> Result<Json<ApiResponse<NotificationPreferences>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let preferences = state
        .services
        .fanout
        .update_preferences(customer_id, body.muted_types)
        .await?;
    Ok(Json(ApiResponse::success(preferences)))
}
