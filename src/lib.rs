//! TPC-DS benchmark pipeline for Dremio clusters backed by HDFS.
//!
//! The [`pipeline::Orchestrator`] sequences the stages in [`stages`]; query
//! and DDL work goes through the [`client::JobClient`] submit/poll loop.

pub mod client;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod stages;

pub use error::{BenchError, Result};
