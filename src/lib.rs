//! # pla-compose
//!
//! Distributed composition of Boolean functions.
//!
//! A job is a tree of named modules, each holding a single-output
//! sum-of-products table read from a PLA file. A child's output feeds one
//! input variable of its parent. The coordinator spreads the modules over a
//! fixed set of workers, compiles the tree into one instruction program per
//! worker and relays module traffic between them until the root, with every
//! descendant substituted in, comes back as the result.
//!
//! ## Layout
//!
//! - [`function`]: function tables and the merge kernel
//! - [`module`]: tree nodes and their repository
//! - [`schedule`]: distribution, leveling and instruction compilation
//! - [`shared`]: frames, payload codecs and the transport trait
//! - [`coordinator`]: job orchestration and relaying
//! - [`worker`]: program interpretation
//! - [`loader`], [`config`]: job and runtime configuration
//!
//! ## Example
//!
//! ```
//! use pla_compose::function::FunctionTable;
//! use pla_compose::module::{Module, ModuleRepository};
//! use pla_compose::schedule;
//!
//! let mut repo = ModuleRepository::new();
//! repo.insert(Module::new("R", FunctionTable::new(2))).unwrap();
//! repo.insert(Module::new("A", FunctionTable::new(1))).unwrap();
//! repo.attach_child("R", "A", 0).unwrap();
//!
//! let plan = schedule::plan(&mut repo, 2).unwrap();
//! assert_eq!(plan.programs[0].to_text(), "MERG R A\nEND R\n");
//! assert!(plan.programs[1].is_empty());
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod function;
pub mod loader;
pub mod logging;
pub mod module;
pub mod schedule;
pub mod shared;
pub mod worker;

pub use coordinator::{Coordinator, JobOutcome, JobState};
pub use error::{Error, Result};
pub use loader::{JobLoader, LoadReport};
pub use worker::{WorkerReport, WorkerRuntime};
