//! Queue transport implementations.
//!
//! This module contains concrete implementations of the `QueueTransport` and
//! `QueueConnection` traits.

pub mod memory;

pub use memory::{InMemoryBroker, InMemoryConfig, InMemoryConnection, InMemoryTransport};
