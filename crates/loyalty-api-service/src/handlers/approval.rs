//! 审批请求处理器

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use loyalty_management::{ApprovalRequest, LoyaltyError};
use tracing::instrument;

use super::with_deadline;
use crate::auth::{Principal, Role};
use crate::dto::{ApiResponse, CreateApprovalBody, RespondBody, RespondEnvelope, ValidatedJson};
use crate::error::ApiError;
use crate::state::AppState;

/// 商家发起审批请求
///
/// POST /api/approval-requests
#[instrument(skip(state, body), fields(business_id = principal.id))]
pub async fn create_approval_request(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(body): ValidatedJson<CreateApprovalBody>,
) -> Result<(StatusCode, Json<ApiResponse<ApprovalRequest>>), ApiError> {
    let business_id = principal.business_id()?;
    let request = state
        .services
        .approvals
        .create_approval_request(body.into_request(business_id))
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(request))))
}

/// 顾客批准或拒绝
///
/// PUT /api/approval-requests/{id}/respond
#[instrument(skip(state, body), fields(customer_id = principal.id))]
pub async fn respond_to_approval(
    State(state): State<AppState>,
    principal: Principal,
    Path(request_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<RespondBody>,
) -> Result<Json<RespondEnvelope>, ApiError> {
    let customer_id = principal.customer_id()?;

    let approvals = state.services.approvals.clone();
    let resolution = with_deadline(state.request_timeout, None, async move {
        approvals
            .respond_to_approval(request_id, customer_id, body.approved)
            .await
    })
    .await?;

    Ok(Json(resolution.into()))
}

/// 查询单个审批请求
///
/// GET /api/approval-requests/{id}
pub async fn get_approval_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(request_id): Path<i64>,
) -> Result<Json<ApiResponse<ApprovalRequest>>, ApiError> {
    let request = state.services.approvals.get_request(request_id).await?;

    let owner = match principal.role {
        Role::Customer => request.customer_id,
        Role::Business => request.business_id,
    };
    if owner != principal.id {
        return Err(LoyaltyError::Forbidden(format!("无权查看审批请求 {request_id}")).into());
    }

    Ok(Json(ApiResponse::success(request)))
}

/// 顾客的待处理审批
///
/// GET /api/approval-requests/pending
pub async fn list_pending_approvals(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<ApprovalRequest>>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let requests = state.services.approvals.list_pending(customer_id).await?;
    Ok(Json(ApiResponse::success(requests)))
}
