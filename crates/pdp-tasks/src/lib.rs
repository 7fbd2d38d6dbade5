//! The durable, leased task engine: named queues, each with
//! its own handler and worker pool, backed by `pdp-db`'s `tasks` table.

pub mod engine;
pub mod handler;
pub mod worker;

pub use engine::TaskEngine;
pub use handler::{Outcome, QueueOptions, TaskHandler};
