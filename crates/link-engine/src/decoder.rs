//! # Decoder Registry
//!
//! Turns a raw `(topic, payload)` pair into an [`ArrivedMessage`] plus the
//! path params captured from the topic. Decoders are tried in registration
//! order and the first match wins, so more specific topics must come before
//! more general ones.

use shared_types::{ArrivedMessage, DeviceIdentity, MessageKind, TopicTemplate};
use std::sync::Arc;
use tracing::debug;

/// A decoded message and the values its topic placeholders captured.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub message: ArrivedMessage,
    pub path_params: Vec<String>,
}

/// Stateless translator from wire form to an arrived message.
pub trait Decoder: Send + Sync {
    /// Returns `None` when the message is not one this decoder understands.
    fn decode(&self, topic: &str, payload: &[u8]) -> Option<DecodeResult>;
}

/// Decodes one message kind whose topic fits a template and whose body is
/// the standard JSON envelope. The first two path params are taken as
/// product key and device key.
#[derive(Debug, Clone)]
pub struct TopicDecoder {
    kind: MessageKind,
    template: TopicTemplate,
}

impl TopicDecoder {
    pub fn new(kind: MessageKind, template: impl Into<TopicTemplate>) -> Self {
        Self {
            kind,
            template: template.into(),
        }
    }

    /// Decoder for a built-in kind, using its own template.
    pub fn for_kind(kind: MessageKind) -> Option<Self> {
        let template = kind.topic_template()?;
        Some(Self { kind, template })
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }
}

impl Decoder for TopicDecoder {
    fn decode(&self, topic: &str, payload: &[u8]) -> Option<DecodeResult> {
        let path_params = self.template.capture(topic)?;
        let identity = DeviceIdentity::from_path(&path_params);
        match ArrivedMessage::from_json(self.kind.clone(), topic, identity, payload) {
            Ok(message) => Some(DecodeResult {
                message,
                path_params,
            }),
            Err(e) => {
                debug!(topic, kind = %self.kind, error = %e, "Topic matched but body did not decode");
                None
            }
        }
    }
}

/// Ordered list of decoders.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// Empty registry; nothing decodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`TopicDecoder`] for every built-in inbound kind, in priority order.
    pub fn standard() -> Self {
        let decoders = MessageKind::builtin_inbound()
            .into_iter()
            .filter_map(TopicDecoder::for_kind)
            .map(|decoder| Arc::new(decoder) as Arc<dyn Decoder>)
            .collect();
        Self { decoders }
    }

    /// Append a decoder; it is tried after all existing ones.
    pub fn push(&mut self, decoder: Arc<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    /// Prepend a decoder; it is tried before all existing ones.
    pub fn prepend(&mut self, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(0, decoder);
    }

    #[must_use]
    pub fn with(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.push(decoder);
        self
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// First successful decode, or `None`.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Option<DecodeResult> {
        self.decoders
            .iter()
            .find_map(|decoder| decoder.decode(topic, payload))
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.decoders.len())
            .finish()
    }
}
