//! 积分发放处理器

use axum::{Json, extract::State};
use loyalty_management::AwardService;
use loyalty_management::dto::AwardResult;
use tracing::instrument;

use super::with_deadline;
use crate::auth::Principal;
use crate::dto::{ApiResponse, AwardPointsBody, ValidatedJson};
use crate::error::ApiError;
use crate::state::AppState;

/// 商家为顾客发放积分
///
/// POST /api/award-points
///
/// 未携带 transactionRef 时由服务端生成，并在结果与超时错误中返回，
/// 客户端重试时带上它即可避免重复发放。
#[instrument(skip(state, body), fields(business_id = principal.id))]
pub async fn award_points(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(body): ValidatedJson<AwardPointsBody>,
) -> Result<Json<ApiResponse<AwardResult>>, ApiError> {
    let business_id = principal.business_id()?;
    let transaction_ref = body
        .transaction_ref
        .clone()
        .unwrap_or_else(AwardService::generate_transaction_ref);
    let request = body.into_request(business_id, transaction_ref.clone());

    let awards = state.services.awards.clone();
    let result = with_deadline(state.request_timeout, Some(transaction_ref), async move {
        awards.award_points(request).await
    })
    .await?;

    Ok(Json(ApiResponse::success(result)))
}
