//! # Reply Builder
//!
//! Produces protocol-compliant replies to commands: correlation fields
//! copied from the command, synthesized error replies when no handler exists
//! or a handler fails, and the reserved-code check on handler replies.

use crate::config::ReplyCodePolicy;
use shared_types::codes::{
    self, COMMAND_HANDLER_EXECUTION_FAILED, COMMAND_HANDLER_NOT_REGISTERED,
};
use shared_types::{ArrivedMessage, ReplyMessage};

pub const NOT_REGISTERED_MESSAGE: &str = "downstream command handler not registered";
pub const EXECUTION_FAILED_PREFIX: &str = "command handler execution failed";

/// A reply ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundReply {
    pub reply: ReplyMessage,
    /// The protocol-reserved code the handler returned, if it did.
    pub reserved_code: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyBuilder {
    policy: ReplyCodePolicy,
}

impl ReplyBuilder {
    pub fn new(policy: ReplyCodePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReplyCodePolicy {
        self.policy
    }

    /// Reply for a command no handler is registered for.
    pub fn not_registered(&self, command: &ArrivedMessage, path: &[String]) -> ReplyMessage {
        ReplyMessage::new(COMMAND_HANDLER_NOT_REGISTERED, NOT_REGISTERED_MESSAGE)
            .correlate(command, path)
    }

    /// Reply for a command whose handler failed with `detail`.
    pub fn execution_failed(
        &self,
        command: &ArrivedMessage,
        path: &[String],
        detail: &str,
    ) -> ReplyMessage {
        ReplyMessage::new(
            COMMAND_HANDLER_EXECUTION_FAILED,
            format!("{EXECUTION_FAILED_PREFIX}, {detail}"),
        )
        .correlate(command, path)
    }

    /// Correlate a handler's reply with its command and apply the
    /// reserved-code policy.
    pub fn bind(&self, reply: ReplyMessage, command: &ArrivedMessage, path: &[String]) -> BoundReply {
        let code = reply.code();
        if !codes::is_protocol_reserved(code) {
            return BoundReply {
                reply: reply.correlate(command, path),
                reserved_code: None,
            };
        }

        let reply = match self.policy {
            ReplyCodePolicy::Lenient => reply.correlate(command, path),
            ReplyCodePolicy::Strict => self.execution_failed(
                command,
                path,
                &format!("reply code {code} is reserved for the protocol"),
            ),
        };
        BoundReply {
            reply,
            reserved_code: Some(code),
        }
    }
}
