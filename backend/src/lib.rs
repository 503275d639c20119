//! # Relief Priority Engine
//!
//! Demand-aware prioritization and dispatch recommendation engine for
//! disaster-relief coordination.
//!
//! The engine reads open rescue requests, warehouses and inventory, and on a
//! fixed cadence (or on demand) produces:
//!
//! - per-region demand pressure cells and a bounded trend timeline,
//! - a ranked, explainable priority queue of open requests,
//! - concrete dispatch recommendations with confidence and rationale.
//!
//! Operators apply or dismiss recommendations; applying decrements stock and
//! writes a distribution log entry as one atomic unit.
//!
//! ## Architecture
//!
//! - [`config`]: Engine configuration (weights, cadence, bounds)
//! - [`models`]: Read models and engine outputs
//! - [`db`]: Repository traits, local and PostgreSQL backends
//! - [`services`]: Aggregation, scoring, generation, apply, orchestration
//! - [`http`]: Axum-based REST API

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
