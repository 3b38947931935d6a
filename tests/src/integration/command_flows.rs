//! # Command Flows
//!
//! Inbound commands and notifications through the dispatch table:
//!
//! - handler replies correlated with their command
//! - synthesized replies for missing and failing handlers
//! - reserved status codes under both reply-code policies

#[cfg(test)]
mod tests {
    use crate::support::{client, client_with, command_body};
    use anyhow::Context;
    use link_engine::{EngineConfig, ReplyCodePolicy};
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_bus::{EngineEvent, EventFilter, EventTopic};
    use shared_types::codes::{COMMAND_HANDLER_EXECUTION_FAILED, COMMAND_HANDLER_NOT_REGISTERED};
    use shared_types::typed::ServiceInvocationReply;
    use shared_types::{ArrivedMessage, DeviceIdentity, MessageKind, ReplyMessage};
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const SET_TOPIC: &str = "/sys/pk/dk/thing/service/measurepoint/set";
    const SET_REPLY: &str = "/sys/pk/dk/thing/service/measurepoint/set_reply";
    const DISABLE_TOPIC: &str = "/ext/session/pk/dk/combine/disable";
    const WAIT: Duration = Duration::from_secs(2);

    fn set_command(id: &str) -> Vec<u8> {
        command_body(
            id,
            "thing.service.measurepoint.set",
            json!({"valve": "open"}),
        )
    }

    // =============================================================================
    // HANDLER REPLIES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handler_reply_is_correlated() {
        let (client, transport) = client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            move |command: &ArrivedMessage, path: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                recorder.lock().push((command.payload().clone(), path.to_vec()));
                Ok(Some(ReplyMessage::success().with_data(json!({"valve": "open"}))))
            },
        );

        client.listener().message_arrived(SET_TOPIC, &set_command("77"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies.len(), 1);
        let reply = &replies[0];
        assert_eq!(reply.code(), 200);
        assert_eq!(reply.message_id(), "77");
        assert_eq!(reply.identity(), &DeviceIdentity::new("pk", "dk"));
        assert_eq!(reply.topic().unwrap(), SET_REPLY);
        assert_eq!(reply.data(), &json!({"valve": "open"}));

        assert_eq!(
            seen.lock().as_slice(),
            &[(
                json!({"valve": "open"}),
                vec!["pk".to_string(), "dk".to_string()]
            )]
        );

        // Counted after the transport accepted the reply.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.stats().replies_published, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_service_invocation_reply_topic_uses_service_name() {
        let (client, transport) = client();
        client.register_handler(
            MessageKind::ServiceInvocationCommand,
            |command: &ArrivedMessage, path: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                let delay = command.payload()["delay"].as_u64().context("delay missing")?;
                Ok(Some(
                    ServiceInvocationReply::builder()
                        .add_output_data("service", path[2].clone())
                        .add_output_data("scheduled_in", delay)
                        .build(),
                ))
            },
        );

        client.listener().message_arrived(
            "/sys/pk/dk/thing/service/restart",
            &command_body("3", "thing.service.restart", json!({"delay": 30})),
        );

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies[0].topic().unwrap(), "/sys/pk/dk/thing/service/restart_reply");
        assert_eq!(
            replies[0].data(),
            &json!({"service": "restart", "scheduled_in": 30})
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handler_without_reply_sends_nothing() {
        let (client, transport) = client();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            move |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                *counter.lock() += 1;
                Ok(None)
            },
        );

        client.listener().message_arrived(SET_TOPIC, &set_command("1"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*calls.lock(), 1);
        assert!(transport.published().is_empty());
    }

    // =============================================================================
    // SYNTHESIZED REPLIES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_handler_replies_not_registered() {
        let (client, transport) = client();

        client.listener().message_arrived(SET_TOPIC, &set_command("12"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code(), COMMAND_HANDLER_NOT_REGISTERED);
        assert_eq!(replies[0].message(), "downstream command handler not registered");
        assert_eq!(replies[0].message_id(), "12");
        assert_eq!(replies[0].identity(), &DeviceIdentity::new("pk", "dk"));
        assert_eq!(replies[0].topic().unwrap(), SET_REPLY);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_removed_handler_replies_not_registered() {
        let (client, transport) = client();
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                Ok(Some(ReplyMessage::success()))
            },
        );
        assert!(client.remove_handler(&MessageKind::MeasurepointSetCommand));
        assert!(!client.remove_handler(&MessageKind::MeasurepointSetCommand));

        client.listener().message_arrived(SET_TOPIC, &set_command("13"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies[0].code(), COMMAND_HANDLER_NOT_REGISTERED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failing_handler_replies_execution_failed() {
        let (client, transport) = client();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Dispatch]));
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                anyhow::bail!("valve actuator offline")
            },
        );

        client.listener().message_arrived(SET_TOPIC, &set_command("21"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code(), COMMAND_HANDLER_EXECUTION_FAILED);
        assert_eq!(
            replies[0].message(),
            "command handler execution failed, valve actuator offline"
        );
        assert_eq!(replies[0].message_id(), "21");
        assert_eq!(replies[0].identity(), &DeviceIdentity::new("pk", "dk"));
        assert_eq!(replies[0].topic().unwrap(), SET_REPLY);

        assert_eq!(
            events.drain(),
            vec![EngineEvent::HandlerFailed {
                kind: MessageKind::MeasurepointSetCommand,
                message_id: "21".into(),
                detail: "valve actuator offline".into(),
            }]
        );
        assert_eq!(client.stats().handler_failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_handler_is_contained() {
        let (client, transport) = client();
        client.register_handler(
            MessageKind::MeasurepointSetCommand,
            |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                panic!("register map corrupted")
            },
        );

        client.listener().message_arrived(SET_TOPIC, &set_command("22"));
        client.listener().message_arrived(SET_TOPIC, &set_command("23"));

        let replies = transport.wait_for_replies(2, WAIT).await;
        assert_eq!(replies.len(), 2);
        for reply in &replies {
            assert_eq!(reply.code(), COMMAND_HANDLER_EXECUTION_FAILED);
            assert!(reply.message().contains("register map corrupted"));
        }
        let mut ids: Vec<_> = replies.iter().map(|r| r.message_id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["22", "23"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_error_reply_is_contained() {
        let (client, transport) = client();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Transport]));
        transport.fail_publishes(true);

        client.listener().message_arrived(SET_TOPIC, &set_command("31"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(transport.published().is_empty());
        assert!(matches!(
            events.drain().as_slice(),
            [EngineEvent::PublishFailed { .. }]
        ));

        // The engine keeps serving afterwards.
        transport.fail_publishes(false);
        client.listener().message_arrived(SET_TOPIC, &set_command("32"));
        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies[0].message_id(), "32");
    }

    // =============================================================================
    // RESERVED CODES
    // =============================================================================

    fn reserved_code_handler() -> impl Fn(&ArrivedMessage, &[String]) -> anyhow::Result<Option<ReplyMessage>>
           + Send
           + Sync
           + 'static {
        |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
            Ok(Some(ReplyMessage::new(150, "partial apply")))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reserved_code_sent_unmodified_by_default() {
        let (client, transport) = client();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Dispatch]));
        client.register_handler(MessageKind::MeasurepointSetCommand, reserved_code_handler());

        client.listener().message_arrived(SET_TOPIC, &set_command("41"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies[0].code(), 150);
        assert_eq!(replies[0].message(), "partial apply");
        assert_eq!(replies[0].message_id(), "41");
        assert_eq!(
            events.drain(),
            vec![EngineEvent::ReservedReplyCode {
                code: 150,
                message_id: "41".into(),
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reserved_code_replaced_under_strict_policy() {
        let (client, transport) = client_with(EngineConfig {
            reply_code_policy: ReplyCodePolicy::Strict,
            ..EngineConfig::default()
        });
        client.register_handler(MessageKind::MeasurepointSetCommand, reserved_code_handler());

        client.listener().message_arrived(SET_TOPIC, &set_command("42"));

        let replies = transport.wait_for_replies(1, WAIT).await;
        assert_eq!(replies[0].code(), COMMAND_HANDLER_EXECUTION_FAILED);
        assert_eq!(replies[0].message_id(), "42");
    }

    // =============================================================================
    // NOTIFICATIONS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_notification_without_handler_is_dropped() {
        let (client, transport) = client();

        client.listener().message_arrived(
            DISABLE_TOPIC,
            &command_body("5", "combine.disable", json!({"productKey": "sub_pk"})),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(transport.published().is_empty());
        let stats = client.stats();
        assert_eq!(stats.decode_failures, 0);
        assert_eq!(stats.handler_failures, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failing_notification_handler_sends_no_reply() {
        let (client, transport) = client();
        client.register_handler(
            MessageKind::SubDeviceDisableNotice,
            |_: &ArrivedMessage, _: &[String]| -> anyhow::Result<Option<ReplyMessage>> {
                anyhow::bail!("unknown sub-device")
            },
        );

        client.listener().message_arrived(
            DISABLE_TOPIC,
            &command_body("6", "combine.disable", json!({})),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(transport.published().is_empty());
        assert_eq!(client.stats().handler_failures, 1);
    }
}
