//! Test and demo support.
//!
//! Production deployments supply their own tables and geometry engines;
//! this module provides just enough of both for the crate's tests,
//! examples, and quick experiments: a Vec-backed [`MemoryTable`] and a
//! [`CartesianEngine`] matching points within a fixed isotropic
//! tolerance.

mod engine;
mod table;

pub use engine::{CartesianEngine, CartesianKit, CellKey};
pub use table::MemoryTable;
