//! # Lifecycle Flows
//!
//! Connection state transitions, connect callbacks, and rebuilding the
//! client over a new transport.

#[cfg(test)]
mod tests {
    use crate::support::{client, recv_within, response_body, ChannelCallback, RecordingTransport};
    use std::sync::Arc;
    use link_engine::NOT_AUTHORIZED;
    use serde_json::json;
    use shared_bus::{EngineEvent, EventFilter, EventTopic};
    use shared_types::{
        ArrivedMessage, ConnectionState, DeviceIdentity, MessageKind, ReplyMessage, RequestMessage,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::StreamExt;

    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // CONNECTION STATE
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_connect_lose_reconnect() {
        let (client, transport) = client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.set_connect_callback(ChannelCallback(tx));
        let listener = client.listener();

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.wait_connected(Duration::from_millis(20)).await);

        client.connecting();
        listener.connect_complete(false, "ssl://broker:18883");
        assert!(client.wait_connected(WAIT).await);
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("success"));

        listener.connection_lost("keepalive timeout");
        assert_eq!(client.connection_state(), ConnectionState::Lost);
        assert!(!client.is_connected());
        assert_eq!(transport.cache_clears(), 1);
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("lost"));

        listener.connect_complete(true, "ssl://broker:18883");
        assert!(client.is_connected());
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("success"));

        client.close();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_not_authorized_reaches_callback() {
        let (client, _transport) = client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.set_connect_callback(ChannelCallback(tx));

        client.connecting();
        client.listener().connect_failed(NOT_AUTHORIZED);

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("failed:5"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cleared_callback_is_not_called() {
        let (client, _transport) = client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.set_connect_callback(ChannelCallback(tx));
        client.clear_connect_callback();

        client.listener().connect_complete(false, "tcp://broker:1883");

        assert!(client.is_connected());
        assert!(recv_within(&mut rx, Duration::from_millis(100)).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_changes_stream() {
        let (client, _transport) = client();
        let mut stream = client.event_stream(EventFilter::topics(vec![EventTopic::Connection]));
        let listener = client.listener();

        client.connecting();
        listener.connect_complete(false, "tcp://broker:1883");
        listener.connection_lost("reset by peer");

        let mut transitions = Vec::new();
        for _ in 0..3 {
            match tokio::time::timeout(WAIT, stream.next()).await.unwrap() {
                Some(EngineEvent::ConnectionStateChanged { to, .. }) => transitions.push(to),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            transitions,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Lost,
            ]
        );
    }

    // =============================================================================
    // REBUILD
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rebuild_carries_handlers_callback_and_pending() {
        let (client, old_transport) = client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.set_connect_callback(ChannelCallback(tx));
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                Ok(Some(ReplyMessage::success()))
            },
        );
        client.listener().connect_complete(false, "tcp://old:1883");
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("success"));

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let key = client
            .request_with_callback_within(
                RequestMessage::new(
                    MessageKind::MeasurepointPostRequest,
                    DeviceIdentity::new("pk", "dk"),
                )
                .with_message_id("500"),
                move |response| {
                    let _ = done_tx.send(response.message_id().to_string());
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let new_transport = RecordingTransport::new("test-device-2");
        client.rebuild(new_transport.clone()).unwrap();
        let listener = client.listener();

        // Fresh connection state, same callback.
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        listener.connect_complete(false, "tcp://new:1883");
        assert_eq!(recv_within(&mut rx, WAIT).await.as_deref(), Some("success"));

        // Pending request survives and completes through the new listener.
        assert_eq!(client.pending_requests(), 1);
        listener.message_arrived(
            "/sys/pk/dk/thing/measurepoint/post_reply",
            &response_body("500", 200, json!({})),
        );
        assert_eq!(recv_within(&mut done_rx, WAIT).await.as_deref(), Some("500"));
        assert_eq!(key.as_str(), "/sys/pk/dk/thing/measurepoint/post_reply_500");

        // Handler survives; replies go out on the new transport.
        listener.message_arrived(
            "/sys/pk/dk/thing/service/measurepoint/set",
            &crate::support::command_body("9", "thing.service.measurepoint.set", json!({})),
        );
        let replies = new_transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code(), 200);
        assert!(old_transport.replies().is_empty());

        // Stats carry over too.
        assert_eq!(client.stats().requests_sent, 1);
        assert_eq!(client.stats().responses_matched, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_survives_rebuild() {
        let (client, _old_transport) = client();
        let client = Arc::new(client);
        client.connecting();

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.wait_connected(Duration::from_millis(800)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.rebuild(RecordingTransport::new("test-device-2")).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!waiter.is_finished());

        client.listener().connect_complete(true, "tcp://new:1883");

        assert!(waiter.await.unwrap());
        assert!(client.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rebuild_resets_connected_state() {
        let (client, _old_transport) = client();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Connection]));
        client.listener().connect_complete(false, "tcp://old:1883");
        assert!(client.is_connected());

        client.rebuild(RecordingTransport::new("test-device-2")).unwrap();

        assert!(!client.is_connected());
        assert_eq!(
            events.drain(),
            vec![
                EngineEvent::ConnectionStateChanged {
                    from: ConnectionState::Disconnected,
                    to: ConnectionState::Connected,
                },
                EngineEvent::ConnectionStateChanged {
                    from: ConnectionState::Connected,
                    to: ConnectionState::Disconnected,
                },
            ]
        );
    }
}
