//! # Reply Status Codes
//!
//! Codes below [`USER_DEFINED_THRESHOLD`] belong to the protocol; handlers
//! should only emit [`SUCCESS`] or a code at/above the threshold.

/// The request or command succeeded.
pub const SUCCESS: i32 = 200;

/// First code available to handler-defined business errors.
pub const USER_DEFINED_THRESHOLD: i32 = 2000;

/// No handler was registered for a command that expects a reply.
pub const COMMAND_HANDLER_NOT_REGISTERED: i32 = 1310;

/// The registered handler failed while processing a command.
pub const COMMAND_HANDLER_EXECUTION_FAILED: i32 = 1311;

/// Returns true when `code` is protocol-reserved and not [`SUCCESS`].
///
/// A handler reply carrying such a code is suspicious: it either collides
/// with a protocol error or was meant to be a business code.
#[must_use]
pub fn is_protocol_reserved(code: i32) -> bool {
    code < USER_DEFINED_THRESHOLD && code != SUCCESS
}
