//! Message broker abstraction for the order saga.
//!
//! Participants and the orchestrator never call each other; they publish
//! serialized events to named topics and consume the topics they own.
//! This crate provides the publish/subscribe contract, an in-memory
//! transport, and the consumer loop that feeds messages to handlers.

pub mod broker;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;

pub use broker::{MessageBroker, MessageStream};
pub use consumer::{Consumer, Dispatcher, MessageHandler, Subscription};
pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
pub use message::Message;
