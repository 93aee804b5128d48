//! 实时推送测试套件
//!
//! 使用真实的 WebSocket 客户端连接服务，验证推送、静音与断线对账。

use std::sync::Arc;
use std::time::Duration;

use loyalty_api::auth::Principal;
use loyalty_realtime::{
    ClientConfig, ConnectionState, HttpPendingSource, MergedSubscription, Reachability,
    ReachabilityMonitor, RealtimeClient, RealtimeEvent, RefreshOrigin, Transport, WsTransport,
};
use tokio::sync::mpsc;

use crate::helpers::*;
use crate::setup::*;

#[cfg(test)]
mod realtime_tests {
    use super::*;

    type Session = (
        RealtimeClient,
        ReachabilityMonitor,
        mpsc::Receiver<RealtimeEvent>,
    );

    async fn connect(env: &TestEnvironment, token: String) -> Session {
        let reachability = ReachabilityMonitor::new(Reachability::Online);
        let (client, events) = RealtimeClient::start(
            WsTransport::new(&env.ws_url, token),
            reachability.subscribe(),
            ClientConfig::default(),
        );
        within(client.wait_for_state(ConnectionState::Connected)).await;
        (client, reachability, events)
    }

    /// 发分后在线会话收到 POINTS_ADDED
    #[tokio::test]
    async fn test_push_delivers_points_added() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let (client, _reachability, mut events) =
            connect(&env, env.token(Principal::customer(CUSTOMER))).await;

        let awarded = business
            .award(CUSTOMER, PROGRAM, 30, Some("push-1"))
            .await
            .unwrap();
        let card_id = assert_ok(&awarded)["cardId"].as_i64().unwrap();

        let event = within(events.recv()).await.unwrap();
        assert_eq!(event.event_type, "POINTS_ADDED");
        assert!(event.notification_id.is_some());
        assert_eq!(event.reference_id, Some(card_id));

        client.close().await;
        env.teardown().await;
    }

    /// 其他顾客的事件不会推送过来
    #[tokio::test]
    async fn test_push_is_scoped_to_customer() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let (client, _reachability, mut events) =
            connect(&env, env.token(Principal::customer(OTHER_CUSTOMER))).await;

        assert_ok(
            &business
                .award(CUSTOMER, PROGRAM, 30, Some("scoped"))
                .await
                .unwrap(),
        );
        let received = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
        assert!(received.is_err(), "不应收到其他顾客的事件");

        client.close().await;
        env.teardown().await;
    }

    /// 静音类型照常落库，但不推送
    #[tokio::test]
    async fn test_muted_type_is_not_pushed() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);
        assert_ok(&customer.mute(&["POINTS_ADDED"]).await.unwrap());

        let (client, _reachability, mut events) =
            connect(&env, customer.token().to_string()).await;

        assert_ok(
            &business
                .award(CUSTOMER, PROGRAM, 10, Some("muted"))
                .await
                .unwrap(),
        );
        let received = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
        assert!(received.is_err(), "静音类型不应推送");

        let notifications = customer.list_notifications().await.unwrap();
        let notifications = assert_ok(&notifications).as_array().unwrap().clone();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["notificationType"], "POINTS_ADDED");

        client.close().await;
        env.teardown().await;
    }

    /// 离线期间创建的审批请求由首次对账补齐，之后的结果走推送
    #[tokio::test]
    async fn test_merged_subscription_reconciles_missed_requests() {
        let env = TestEnvironment::setup().await.unwrap();
        let business = env.business(BUSINESS);
        let customer = env.customer(CUSTOMER);

        let created = business
            .create_approval(CUSTOMER, "ENROLLMENT", SECOND_PROGRAM, None)
            .await
            .unwrap();
        let request_id = assert_ok(&created)["id"].as_i64().unwrap();

        let (client, _reachability, events) = connect(&env, customer.token().to_string()).await;
        let mut merged = MergedSubscription::start(
            events,
            Arc::new(HttpPendingSource::new(&env.base_url, customer.token())),
            Duration::from_secs(60),
            Some(client.watch_state()),
        );

        let signal = within(merged.recv()).await.unwrap();
        assert_eq!(signal.event_type, "ENROLLMENT_REQUEST");
        assert_eq!(signal.origin, RefreshOrigin::Poll);

        assert_ok(&customer.respond(request_id, true).await.unwrap());

        let resolved = within(async {
            loop {
                let signal = merged.recv().await.unwrap();
                if signal.event_type == "APPROVAL_RESOLVED" {
                    return signal;
                }
            }
        })
        .await;
        assert_eq!(resolved.origin, RefreshOrigin::Push);

        drop(merged);
        client.close().await;
        env.teardown().await;
    }

    /// 商户身份无法建立实时连接
    #[tokio::test]
    async fn test_business_token_is_refused() {
        let env = TestEnvironment::setup().await.unwrap();
        let transport = WsTransport::new(
            &env.ws_url,
            env.token(Principal::business(BUSINESS)),
        );

        assert!(transport.connect().await.is_err());

        env.teardown().await;
    }
}
