//! 积分发放测试套件
//!
//! 覆盖首次发放自动开卡、按交易引用幂等重放和并发发放。

use crate::helpers::*;
use crate::setup::*;

#[cfg(test)]
mod award_tests {
    use super::*;
    use futures::future::join_all;

    /// 同一交易引用重放返回原流水，余额只增加一次
    #[tokio::test]
    async fn test_award_replay_is_idempotent() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let first = business
            .award(CUSTOMER, PROGRAM, 50, Some("t1"))
            .await
            .unwrap();
        let first = assert_ok(&first).clone();
        assert_eq!(first["newBalance"], 50);
        assert_eq!(first["replayed"], false);

        let second = business
            .award(CUSTOMER, PROGRAM, 50, Some("t1"))
            .await
            .unwrap();
        let second = assert_ok(&second);
        assert_eq!(second["newBalance"], 50);
        assert_eq!(second["replayed"], true);
        assert_eq!(second["transactionId"], first["transactionId"]);

        let card_id = first["cardId"].as_i64().unwrap();
        let transactions = customer.list_transactions(card_id).await.unwrap();
        let transactions = assert_ok(&transactions).as_array().unwrap().clone();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0]["transactionRef"], "t1");
        assert_eq!(transactions[0]["balanceAfter"], 50);

        env.teardown().await;
    }

    /// 并发发放不同引用，余额等于总和，流水条数一致
    #[tokio::test]
    async fn test_concurrent_awards_sum_up() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let refs: Vec<String> = (0..20).map(|i| format!("burst-{i}")).collect();
        let results = join_all(
            refs.iter()
                .map(|r| business.award(CUSTOMER, PROGRAM, 5, Some(r.as_str()))),
        )
        .await;
        for result in &results {
            assert_ok(result.as_ref().unwrap());
        }

        let cards = customer.list_cards().await.unwrap();
        let cards = assert_ok(&cards).as_array().unwrap().clone();
        assert_eq!(cards.len(), 1, "并发首发只能开一张卡");
        assert_eq!(cards[0]["balance"], 100);

        let card_id = cards[0]["id"].as_i64().unwrap();
        let transactions = customer.list_transactions(card_id).await.unwrap();
        assert_eq!(assert_ok(&transactions).as_array().unwrap().len(), 20);

        env.teardown().await;
    }

    /// 缺少交易引用时服务端生成
    #[tokio::test]
    async fn test_award_without_ref_generates_one() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);

        let response = business.award(CUSTOMER, PROGRAM, 3, None).await.unwrap();
        let data = assert_ok(&response);
        assert!(
            data["transactionRef"]
                .as_str()
                .unwrap()
                .starts_with("txn-")
        );

        env.teardown().await;
    }

    /// 商家不能向其他商家的项目发分
    #[tokio::test]
    async fn test_award_to_foreign_program_is_forbidden() {
        let env = TestEnvironment::setup().await.unwrap();
        let other = env.business(OTHER_BUSINESS);

        let response = other
            .award(CUSTOMER, PROGRAM, 10, Some("x1"))
            .await
            .unwrap();
        assert_error(&response, reqwest::StatusCode::FORBIDDEN, "FORBIDDEN");

        env.teardown().await;
    }
}
