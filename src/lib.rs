//! Tabular ML workflow orchestration.
//!
//! A session walks a dataset through acquisition, profiling, interactive
//! editing, automated model search, evaluation and scoring. Every external
//! tool sits behind a port in [`ports`]; [`workflow::Orchestrator`] sequences
//! them and [`cli`] and [`ui`] are thin front-ends over it.

pub mod adapters;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod ports;
pub mod rng;
pub mod task;
pub mod ui;
pub mod workflow;
