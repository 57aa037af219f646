//! Live sessions relaying frames to hub actors.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use futures::channel::mpsc;
use hubwire_proto::gateway_message;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::{Fixture, HUB_ID, OWNER_ID};
use hubwire_gateway::hub::ProtocolVariant;
use hubwire_gateway::live::{
    LIVE_FRAME_DURATION_MS, LiveGroups, LiveResponse, LiveScope, LiveSession, SessionEnd,
};
use hubwire_gateway::transport::WireFrame;

struct Client {
    to_client: mpsc::Receiver<WireFrame>,
    from_client: mpsc::Sender<Result<WireFrame, String>>,
    cancel: CancellationToken,
    task: JoinHandle<SessionEnd>,
}

impl Client {
    async fn open(fx: &Fixture, groups: &LiveGroups) -> Self {
        let scope = LiveScope::authorize(&fx.db, OWNER_ID, HUB_ID)
            .await
            .unwrap()
            .unwrap();
        let cancel = fx.root.child_token();
        let session = LiveSession::new(
            scope,
            fx.lifetime.clone(),
            groups,
            Duration::from_secs(60),
            cancel.clone(),
        );
        let (sink, to_client) = mpsc::channel::<WireFrame>(64);
        let (from_client, inbound) = mpsc::channel::<Result<WireFrame, String>>(16);
        let task = tokio::spawn(session.run(sink, inbound));
        Self {
            to_client,
            from_client,
            cancel,
            task,
        }
    }

    fn send(&mut self, value: &serde_json::Value) {
        self.send_text(&value.to_string());
    }

    fn send_text(&mut self, text: &str) {
        self.from_client
            .try_send(Ok(WireFrame::Text(text.to_string())))
            .unwrap();
    }

    async fn next_frame(&mut self) -> WireFrame {
        tokio::time::timeout(Duration::from_secs(5), self.to_client.next())
            .await
            .unwrap()
            .unwrap()
    }

    async fn next_response(&mut self) -> LiveResponse {
        match self.next_frame().await {
            WireFrame::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

fn frame(shocker: &str, intensity: u8) -> serde_json::Value {
    json!({
        "requestType": "Frame",
        "data": { "shocker": shocker, "type": "vibrate", "intensity": intensity }
    })
}

#[tokio::test]
async fn frames_reach_the_connected_hub() {
    let fx = Fixture::new().await;
    let groups = LiveGroups::default();
    let mut client = Client::open(&fx, &groups).await;

    assert!(matches!(client.next_response().await, LiveResponse::Ping { .. }));

    client.send(&frame("s-1", 30));
    assert_eq!(client.next_response().await, LiveResponse::DeviceNotConnected);

    let mut hub = fx.connect_hub(ProtocolVariant::V1, "1.2.3").await;
    client.send(&frame("s-1", 30));
    let gateway_message::Payload::ShockerCommandList(list) = hub.next_payload().await else {
        panic!("expected a command list");
    };
    assert_eq!(list.commands.len(), 1);
    assert_eq!(list.commands[0].rf_id, 4242);
    assert_eq!(list.commands[0].intensity, 30);
    assert_eq!(list.commands[0].duration_ms, u32::from(LIVE_FRAME_DURATION_MS));

    client.send(&frame("s-404", 30));
    assert_eq!(client.next_response().await, LiveResponse::ShockerNotFound);

    client.send_text("not json");
    assert_eq!(client.next_response().await, LiveResponse::InvalidData);

    client.send(&json!({ "requestType": "Dance", "data": {} }));
    assert_eq!(client.next_response().await, LiveResponse::RequestTypeNotFound);

    client.from_client.close_channel();
    assert_eq!(client.next_frame().await, WireFrame::close(1000, ""));
    assert_eq!(client.task.await.unwrap(), SessionEnd::ClientClosed);
    assert_eq!(groups.group_count(), 0);
}

#[tokio::test]
async fn latency_is_announced_to_the_whole_group() {
    let fx = Fixture::new().await;
    let groups = LiveGroups::default();
    let mut first = Client::open(&fx, &groups).await;
    let mut second = Client::open(&fx, &groups).await;
    assert_eq!(groups.session_count(HUB_ID), 2);

    for client in [&mut first, &mut second] {
        assert!(matches!(client.next_response().await, LiveResponse::Ping { .. }));
    }

    let echoed = Utc::now().timestamp_millis() - 25;
    first.send(&json!({ "requestType": "Pong", "data": { "timestamp": echoed } }));
    for client in [&mut first, &mut second] {
        let LiveResponse::LatencyAnnounce { user_id, latency_ms } = client.next_response().await
        else {
            panic!("expected a latency announcement");
        };
        assert_eq!(user_id, OWNER_ID);
        assert!(latency_ms >= 25);
    }

    // A pong from the future is clamped rather than reported as negative.
    let future = Utc::now().timestamp_millis() + 60_000;
    second.send(&json!({ "requestType": "Pong", "data": { "timestamp": future } }));
    let LiveResponse::LatencyAnnounce { latency_ms, .. } = first.next_response().await else {
        panic!("expected a latency announcement");
    };
    assert_eq!(latency_ms, 0);
}

#[tokio::test]
async fn shutdown_closes_sessions_with_service_restart() {
    let fx = Fixture::new().await;
    let groups = LiveGroups::default();
    let mut client = Client::open(&fx, &groups).await;
    let _ping = client.next_response().await;

    client.cancel.cancel();
    assert_eq!(
        client.next_frame().await,
        WireFrame::close(1012, "gateway shutting down")
    );
    assert_eq!(client.task.await.unwrap(), SessionEnd::Shutdown);
}

#[tokio::test]
async fn strangers_get_no_scope() {
    let fx = Fixture::new().await;
    assert!(
        LiveScope::authorize(&fx.db, "stranger", HUB_ID)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        LiveScope::authorize(&fx.db, OWNER_ID, "hub-404")
            .await
            .unwrap()
            .is_none()
    );
}
