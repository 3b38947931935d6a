//! # Shared Bus - Diagnostic Event Bus
//!
//! The correlation engine contains every failure it meets: a payload nobody
//! can decode, a response nobody waits for, a handler that panics. Those
//! outcomes are logged, and they are also published here as [`EngineEvent`]s
//! so that tests and embedding applications can react to them.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  subscribe()  ┌────────────┐
//! │  Processor   │ ────────────▶ │  Event Bus   │ ────────────▶ │  Observer  │
//! └──────────────┘               └──────────────┘               └────────────┘
//! ```
//!
//! Publishing never blocks and never fails; with no subscriber the event is
//! simply discarded.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EngineEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
