//! Compact multi-maps from bin key to accumulated values.
//!
//! Binning dominates the matcher's memory footprint and the overwhelmingly
//! common case is one or two values per bin, so both binners store small
//! bins inline and only spill to a heap list on overflow. Callers never
//! observe which representation a bin is using.

mod long_binner;
mod object_binner;

pub use long_binner::{LongBinner, Longs};
pub use object_binner::ObjectBinner;
