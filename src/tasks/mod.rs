//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Removes entries whose expiry has passed, even if never read again

mod cleanup;

pub use cleanup::spawn_sweep_task;
