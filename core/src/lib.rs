//! Game lifecycle analytics core.
//!
//! Pipeline: source loader → master merge → { cohort retention engine,
//! A/B aggregation engine }. Everything downstream of the loader is a
//! pure function of typed in-memory tables; the only I/O boundaries are
//! the delimited source files and the SQLite warehouse.
//!
//! RULES:
//!   - Schema validation happens once, at the loader boundary.
//!   - Only `store` talks to the database.
//!   - Undefined ratios (zero baselines, no paying users, tiny samples)
//!     are explicit `Option`/`Undefined` values, never NaN and never a
//!     silent zero.

pub mod abtest;
pub mod cache;
pub mod error;
pub mod etl;
pub mod loader;
pub mod merge;
pub mod model;
pub mod retention;
pub mod service;
pub mod store;
pub mod synthetic;
pub mod types;
