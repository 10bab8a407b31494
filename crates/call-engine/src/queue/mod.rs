//! Support call queueing and atomic agent assignment.

pub mod manager;

pub use manager::{Assignment, QueueEntry, QueueManager, QueueStats};
