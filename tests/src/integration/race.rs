//! # Completion Races
//!
//! A pending task is removed exactly once, whoever gets there first:
//! the response, the expiry timer, or a duplicate response.

#[cfg(test)]
mod tests {
    use crate::support::{response_body, RecordingTransport};
    use link_engine::{DecoderRegistry, DeviceClient, EngineConfig, TopicDecoder};
    use parking_lot::Mutex;
    use rand::Rng;
    use serde_json::json;
    use shared_bus::{EngineEvent, EventFilter, EventTopic};
    use shared_types::{MessageClass, MessageKind, RequestMessage};
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    const ANSWER_TOPIC: &str = "t/race";
    const REQUESTS: usize = 200;

    fn race_client() -> DeviceClient {
        let decoders = DecoderRegistry::standard().with(Arc::new(TopicDecoder::new(
            MessageKind::custom("race_reply", MessageClass::Response),
            ANSWER_TOPIC,
        )));
        DeviceClient::with_decoders(
            EngineConfig::default(),
            decoders,
            RecordingTransport::new("race-device"),
        )
        .unwrap()
    }

    /// Responses land randomly around the deadline; every request ends up
    /// either completed or expired, never both and never neither.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_response_and_expiry_race_exactly_once() {
        let client = race_client();
        let listener = client.listener();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Correlation]));
        let completions: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        for i in 0..REQUESTS {
            let id = format!("r{i}");
            let seen = completions.clone();
            client
                .request_with_callback_within(
                    RequestMessage::custom("race", "t/race/request", ANSWER_TOPIC)
                        .with_message_id(id.clone()),
                    move |response| {
                        *seen
                            .lock()
                            .entry(response.message_id().to_string())
                            .or_default() += 1;
                    },
                    Duration::from_millis(50),
                )
                .await
                .unwrap();
        }

        let delays: Vec<u64> = {
            let mut rng = rand::thread_rng();
            (0..REQUESTS).map(|_| rng.gen_range(0..100)).collect()
        };
        let responders: Vec<_> = delays
            .into_iter()
            .enumerate()
            .map(|(i, delay)| {
                let listener = listener.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    listener.message_arrived(
                        ANSWER_TOPIC,
                        &response_body(&format!("r{i}"), 200, json!({})),
                    );
                })
            })
            .collect();
        for responder in responders {
            responder.await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut completed = 0;
        let mut expired = Vec::new();
        let mut unmatched = 0;
        for event in events.drain() {
            match event {
                EngineEvent::RequestCompleted { .. } => completed += 1,
                EngineEvent::RequestExpired { key, .. } => expired.push(key),
                EngineEvent::UnmatchedResponse { .. } => unmatched += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }

        let completions = completions.lock();
        assert_eq!(completed + expired.len(), REQUESTS);
        assert_eq!(completions.len(), completed);
        assert!(completions.values().all(|count| *count == 1));
        for key in &expired {
            let id = key.trim_start_matches("t/race_");
            assert!(!completions.contains_key(id), "{id} both completed and expired");
        }
        // Every response after its expiry was reported as unmatched.
        assert_eq!(unmatched, expired.len());
        assert_eq!(client.pending_requests(), 0);
    }

    /// The same response delivered from several threads at once completes
    /// the request once; the rest are unmatched.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_responses_complete_once() {
        const THREADS: usize = 8;
        let client = race_client();
        let listener = client.listener();
        let mut events = client.events(EventFilter::topics(vec![EventTopic::Correlation]));
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        client
            .request_with_callback_within(
                RequestMessage::custom("race", "t/race/request", ANSWER_TOPIC).with_message_id("dup"),
                move |_| *counter.lock() += 1,
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let barrier = Arc::new(Barrier::new(THREADS));
        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let listener = listener.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    listener.message_arrived(ANSWER_TOPIC, &response_body("dup", 200, json!({})));
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*calls.lock(), 1);
        let stats = client.stats();
        assert_eq!(stats.responses_matched, 1);
        assert_eq!(stats.responses_unmatched, (THREADS - 1) as u64);
        assert_eq!(
            events
                .drain()
                .iter()
                .filter(|e| matches!(e, EngineEvent::RequestCompleted { .. }))
                .count(),
            1
        );
    }
}
