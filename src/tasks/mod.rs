//! Background Tasks Module
//!
//! Contains background tasks that run periodically during proxy operation.
//!
//! # Tasks
//! - Idle clear: Ends session caches whose caller has gone quiet

mod idle;

pub use idle::spawn_idle_clear_task;
