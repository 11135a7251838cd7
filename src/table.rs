//! Consumed row-access contracts.
//!
//! The matcher does not define tabular I/O or column typing; it consumes
//! tables through the small traits in this module. A table presents each
//! row as a tuple of [`Datum`] values, supports sequential scanning, and
//! may additionally support random access by row index (required for at
//! least one side of any pairwise operation).

use std::cmp::Ordering;

use crate::error::Result;

/// A dynamically typed cell value.
///
/// Only the distinctions the matching core needs are modelled: numeric
/// kinds compare among themselves, text compares with text, and everything
/// else (including NaN) is mutually incomparable. Incomparability is
/// reported, not panicked on, so range bounding can fall back to an
/// unbounded axis.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    /// Missing value.
    Null,
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
}

impl Datum {
    /// Compare two values, or report that they are mutually incomparable.
    ///
    /// Numeric kinds are promoted and compared together; NaN and `Null`
    /// compare with nothing.
    pub fn try_cmp(&self, other: &Datum) -> Option<Ordering> {
        match (self, other) {
            (Datum::Int(a), Datum::Int(b)) => Some(a.cmp(b)),
            (Datum::Real(a), Datum::Real(b)) => a.partial_cmp(b),
            (Datum::Int(a), Datum::Real(b)) => (*a as f64).partial_cmp(b),
            (Datum::Real(a), Datum::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Datum::Text(a), Datum::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Numeric view of this value, if it has one.
    ///
    /// NaN yields `None` so that rows with undefined coordinates drop out
    /// of every geometric computation instead of poisoning it.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(i) => Some(*i as f64),
            Datum::Real(r) if !r.is_nan() => Some(*r),
            _ => None,
        }
    }

    /// True for the missing value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

/// A table of rows the matcher can scan.
///
/// Implementations live outside the core (in-memory adapters, file-backed
/// stores, ...); the [`crate::harness`] module provides a simple Vec-backed
/// implementation for tests and examples.
pub trait Table: Send + Sync {
    /// Number of rows.
    fn row_count(&self) -> u64;

    /// Number of columns in every row tuple.
    fn column_count(&self) -> usize;

    /// Whether [`Table::row_access`] is available.
    fn is_random(&self) -> bool;

    /// A sequential reader over all rows, in row-index order.
    fn read_rows(&self) -> Result<Box<dyn RowReader + '_>>;

    /// An independent random accessor.
    ///
    /// Each execution unit obtains its own accessor; accessors are never
    /// shared while in use, so implementations may keep per-accessor
    /// scratch state.
    fn row_access(&self) -> Result<Box<dyn RowAccess + Send + '_>>;
}

/// Streaming cursor over a table's rows.
///
/// Usage: call [`RowReader::advance`] and, while it returns `true`, read
/// the current position with [`RowReader::index`] and [`RowReader::row`].
pub trait RowReader {
    /// Move to the next row; `false` at end of table.
    fn advance(&mut self) -> Result<bool>;

    /// Index of the current row.
    fn index(&self) -> u64;

    /// Tuple of the current row.
    fn row(&self) -> &[Datum];
}

/// Random access to table rows by index.
pub trait RowAccess {
    /// Fetch the row with the given index.
    ///
    /// The returned tuple may borrow accessor scratch and is valid until
    /// the next call.
    fn row(&mut self, index: u64) -> Result<&[Datum]>;
}
