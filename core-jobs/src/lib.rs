//! # Job Orchestration Module
//!
//! Durable job ledger and the worker pool that drains it.
//!
//! ## Overview
//!
//! This crate manages the lifecycle of subtitle-generation jobs:
//! - **Job State Machine** (`job`): pending → running → completed/failed with
//!   explicit retry back to pending
//! - **Job Ledger** (`repository`, `ledger`): the persisted job table is the
//!   sole source of truth for scheduling, so a restart never loses pending work
//! - **Dispatcher** (`dispatcher`): bounded worker pool executing the
//!   externally supplied long-running operation per job
//!
//! Jobs are never deleted once they leave the pending state; terminal rows
//! stay queryable as history, error text included.

pub mod dispatcher;
pub mod error;
pub mod job;
pub mod ledger;
pub mod repository;

pub use dispatcher::{DispatchStats, DispatcherConfig, JobDispatcher, JobOperation};
pub use error::{JobError, Result};
pub use job::{Job, JobId, JobStatus};
pub use ledger::JobLedger;
pub use repository::{JobRepository, SqliteJobRepository};
