// Allow missing docs for internal items
#![allow(missing_docs)]

//! # Link Engine
//!
//! Client-side correlation and dispatch for a device talking to an IoT
//! broker over publish/subscribe.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           DEVICE CLIENT                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  request / request_with_callback / fast_publish      register_handler│
//! │         │                                                   │        │
//! │  ┌──────┴────────────┐   ┌──────────────────┐   ┌───────────┴─────┐  │
//! │  │ Correlation Table │◀──│     Processor    │──▶│  Dispatch Table │  │
//! │  │ (topic_id → task) │   │                  │   │ (kind → handler)│  │
//! │  └──────┬────────────┘   └───┬──────────┬───┘   └─────────────────┘  │
//! │         │                    │          │                            │
//! │  ┌──────┴──────────┐  ┌──────┴─────┐  ┌─┴───────────┐                │
//! │  │Timeout Scheduler│  │  Decoders  │  │ Worker Pool │                │
//! │  └─────────────────┘  └────────────┘  └─────────────┘                │
//! └──────────────────────────────┬───────────────────────────────────────┘
//!                                │ Transport / TransportListener
//!                             broker
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use link_engine::{DeviceClient, EngineConfig};
//!
//! let client = DeviceClient::with_config(EngineConfig::load("link.toml")?, transport)?;
//! transport.set_listener(client.listener());
//!
//! client.register_handler(MessageKind::MeasurepointSetCommand, |cmd: &ArrivedMessage, _: &[String]| {
//!     apply(cmd.payload())?;
//!     Ok(Some(ReplyMessage::success()))
//! });
//!
//! let response = client.request(MeasurepointPostRequest::builder(identity)
//!     .add_measure_point("temp", 21.5)
//!     .build()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
pub mod correlation;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod processor;
pub mod reply;
pub mod scheduler;
pub mod stats;
pub mod worker;

pub use client::DeviceClient;
pub use config::{ConfigError, EngineConfig, ReplyCodePolicy};
pub use correlation::{Completion, CorrelationKey, CorrelationTable, PendingTask};
pub use decoder::{DecodeResult, Decoder, DecoderRegistry, TopicDecoder};
pub use dispatch::DispatchTable;
pub use error::{EngineError, EngineResult};
pub use lifecycle::{ConnectionLifecycle, NOT_AUTHORIZED};
pub use ports::{ConnectCallback, MessageHandler, Transport, TransportListener};
pub use processor::{Processor, ProcessorBuilder, ProcessorState, ResponseFuture};
pub use reply::{BoundReply, ReplyBuilder};
pub use scheduler::{TimeoutHandle, TimeoutScheduler};
pub use stats::{EngineStats, StatsSnapshot};
pub use worker::WorkerPool;
