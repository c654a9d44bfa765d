//! `warehouse-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns)
//! shared by the inventory analytics and the report pipeline.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ProductKey, RunId};
