//! 审批流程测试套件
//!
//! 覆盖入会审批开卡、扣分审批、重复响应与拒绝。

use reqwest::StatusCode;

use crate::helpers::*;
use crate::setup::*;

#[cfg(test)]
mod approval_tests {
    use super::*;

    /// 入会审批通过后开卡，重复提交同样的结论视为重放
    #[tokio::test]
    async fn test_enrollment_approval_opens_card() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let created = business
            .create_approval(CUSTOMER, "ENROLLMENT", SECOND_PROGRAM, None)
            .await
            .unwrap();
        assert_eq!(created.0, StatusCode::CREATED);
        let request_id = assert_ok(&created)["id"].as_i64().unwrap();

        // 待审批列表和待处理通知都能看到这条请求
        let pending = customer.list_pending_approvals().await.unwrap();
        assert_eq!(assert_ok(&pending).as_array().unwrap().len(), 1);
        let notifications = customer.list_pending_notifications().await.unwrap();
        let notifications = assert_ok(&notifications).as_array().unwrap().clone();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["notificationType"], "ENROLLMENT_REQUEST");

        let approved = customer.respond(request_id, true).await.unwrap();
        let data = assert_ok(&approved).clone();
        assert_eq!(data["status"], "APPROVED");
        assert_eq!(data["replayed"], false);
        let card_id = approved.1["cardId"].as_i64().unwrap();
        assert_eq!(data["cardId"], card_id);

        let cards = customer.list_cards().await.unwrap();
        let cards = assert_ok(&cards).as_array().unwrap().clone();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["id"], card_id);
        assert_eq!(cards[0]["programId"], SECOND_PROGRAM);
        assert_eq!(cards[0]["balance"], 0);

        let replay = customer.respond(request_id, true).await.unwrap();
        let replay = assert_ok(&replay);
        assert_eq!(replay["replayed"], true);
        assert_eq!(replay["cardId"], card_id);

        // 相反的结论被拒绝，状态保持不变
        let conflict = customer.respond(request_id, false).await.unwrap();
        assert_error(&conflict, StatusCode::CONFLICT, "ALREADY_RESOLVED");
        assert_eq!(conflict.1["data"]["status"], "APPROVED");

        let fetched = customer.get_approval(request_id).await.unwrap();
        assert_eq!(assert_ok(&fetched)["status"], "APPROVED");

        // 入会请求已处理，剩下未读的开卡通知
        let pending = customer.list_pending_notifications().await.unwrap();
        let pending = assert_ok(&pending).as_array().unwrap().clone();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["notificationType"], "CARD_ACTIVATED");

        let all = customer.list_notifications().await.unwrap();
        let request_notification = assert_ok(&all)
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["notificationType"] == "ENROLLMENT_REQUEST")
            .unwrap()
            .clone();
        assert_eq!(request_notification["actionTaken"], true);

        env.teardown().await;
    }

    /// 扣分审批通过后扣减余额并记一条扣减流水
    #[tokio::test]
    async fn test_deduction_approval_debits_card() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let awarded = business
            .award(CUSTOMER, PROGRAM, 40, Some("seed"))
            .await
            .unwrap();
        let card_id = assert_ok(&awarded)["cardId"].as_i64().unwrap();

        let created = business
            .create_approval(
                CUSTOMER,
                "POINTS_DEDUCTION",
                card_id,
                Some(serde_json::json!({ "points": 15 })),
            )
            .await
            .unwrap();
        let request_id = assert_ok(&created)["id"].as_i64().unwrap();

        let approved = customer.respond(request_id, true).await.unwrap();
        assert_eq!(assert_ok(&approved)["status"], "APPROVED");

        let cards = customer.list_cards().await.unwrap();
        assert_eq!(assert_ok(&cards)[0]["balance"], 25);

        let transactions = customer.list_transactions(card_id).await.unwrap();
        let transactions = assert_ok(&transactions).as_array().unwrap().clone();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0]["balanceAfter"], 25);

        env.teardown().await;
    }

    /// 拒绝不产生任何账务变动
    #[tokio::test]
    async fn test_rejection_leaves_ledger_untouched() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let created = business
            .create_approval(CUSTOMER, "ENROLLMENT", SECOND_PROGRAM, None)
            .await
            .unwrap();
        let request_id = assert_ok(&created)["id"].as_i64().unwrap();

        let declined = customer.respond(request_id, false).await.unwrap();
        let data = assert_ok(&declined);
        assert_eq!(data["status"], "DECLINED");
        assert!(data.get("cardId").is_none());

        let cards = customer.list_cards().await.unwrap();
        assert!(assert_ok(&cards).as_array().unwrap().is_empty());

        env.teardown().await;
    }

    /// 其他顾客无权响应
    #[tokio::test]
    async fn test_other_customer_cannot_respond() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let stranger = env.customer(OTHER_CUSTOMER);

        let created = business
            .create_approval(CUSTOMER, "ENROLLMENT", SECOND_PROGRAM, None)
            .await
            .unwrap();
        let request_id = assert_ok(&created)["id"].as_i64().unwrap();

        let response = stranger.respond(request_id, true).await.unwrap();
        assert_eq!(response.0, StatusCode::FORBIDDEN);

        env.teardown().await;
    }
}
