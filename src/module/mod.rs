//! Composition tree nodes and their owning repository.

mod entity;
mod repository;

pub use entity::{ChildLink, Module};
pub use repository::ModuleRepository;
