//! 会员卡查询处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use loyalty_management::{Card, LoyaltyError, Transaction};

use crate::auth::{Principal, Role};
use crate::dto::{ApiResponse, LimitQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// 顾客的全部会员卡
///
/// GET /api/cards
pub async fn list_cards(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<Card>>>, ApiError> {
    let customer_id = principal.customer_id()?;
    let cards = state
        .services
        .ledger
        .list_cards_by_customer(customer_id)
        .await?;
    Ok(Json(ApiResponse::success(cards)))
}

/// 会员卡流水，按时间倒序
///
/// GET /api/cards/{id}/transactions?limit=
///
/// 持卡顾客与发卡商家都可查看。
pub async fn list_transactions(
    State(state): State<AppState>,
    principal: Principal,
    Path(card_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, ApiError> {
    let card = state
        .services
        .ledger
        .get_card(card_id)
        .await?
        .ok_or(LoyaltyError::CardNotFound(card_id))?;

    let owner = match principal.role {
        Role::Customer => card.customer_id,
        Role::Business => card.business_id,
    };
    if owner != principal.id {
        return Err(LoyaltyError::Forbidden(format!("无权查看会员卡 {card_id}")).into());
    }

    let transactions = state
        .services
        .ledger
        .list_transactions(card_id, query.limit())
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}
