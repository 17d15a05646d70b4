//! Потоковая миграция: reader → bounded queue → пул writer'ов.
//!
//! ```text
//! Migration::run
//!   ├─ source.connect / sink.connect / sink.clear_target
//!   ├─ WorkerPool::spawn (N × queue.take → writer.insert)
//!   ├─ spawn_reader      (cursor.next → queue.put, close)
//!   └─ pool.join → RunReport
//! ```

pub mod config;
pub mod error;
pub mod queue;
mod coordinator;
mod reader;
mod worker;

pub use config::PipelineConfig;
pub use coordinator::{Migration, RunReport, RunState};
pub use error::PipelineError;
pub use reader::{ReadSummary, spawn_reader};
pub use worker::{WorkerPool, WriteSummary};
