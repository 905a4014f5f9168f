//! Queue adapter implementations.
//!
//! This module contains concrete implementations of the [`QueueAdapter`] and
//! [`PushQueueAdapter`] traits for hosted queue services.
//!
//! [`QueueAdapter`]: crate::client::QueueAdapter
//! [`PushQueueAdapter`]: crate::client::PushQueueAdapter

pub mod ironmq;

pub use ironmq::IronMqAdapter;
