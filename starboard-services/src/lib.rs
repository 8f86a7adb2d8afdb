//! Runtime services for the starboard relay
//!
//! This crate wires the core pieces into running tasks: the publisher
//! adapter with its truncate-and-retry policy, the drain scheduler that owns
//! the delay queue, the enqueue handle the chat side calls, and the Discord
//! gateway listener that raises qualifying events.

pub mod listener;
pub mod publisher;
pub mod scheduler;

pub use listener::{ListenerError, StarboardListener};
pub use publisher::{PublishOutcome, PublisherAdapter, TruncationPolicy};
pub use scheduler::{
    AcceptOutcome, DrainConfig, DrainReport, DrainScheduler, EnqueueError, EnqueueHandle,
    SchedulerState,
};
