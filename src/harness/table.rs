//! Vec-backed table implementation.

use crate::error::{Error, Result};
use crate::table::{Datum, RowAccess, RowReader, Table};

/// In-memory table holding its rows as `Vec<Datum>` tuples.
///
/// Random-access by default; [`MemoryTable::sequential_only`] masks that
/// capability to exercise the streaming code paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    rows: Vec<Vec<Datum>>,
    ncol: usize,
    random: bool,
}

impl MemoryTable {
    /// New empty table with the given column count.
    pub fn new(ncol: usize) -> Self {
        Self {
            rows: Vec::new(),
            ncol,
            random: true,
        }
    }

    /// Table over the given rows, which must all have the same width.
    pub fn from_rows(rows: Vec<Vec<Datum>>) -> Result<Self> {
        let ncol = rows.first().map_or(0, Vec::len);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncol {
                return Err(Error::Config(format!(
                    "row {i} has {} columns, expected {ncol}",
                    row.len()
                )));
            }
        }
        Ok(Self {
            rows,
            ncol,
            random: true,
        })
    }

    /// Convenience constructor from real-valued coordinate rows.
    pub fn of_reals(rows: &[&[f64]]) -> Self {
        let ncol = rows.first().map_or(0, |r| r.len());
        debug_assert!(rows.iter().all(|r| r.len() == ncol));
        Self {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|&x| Datum::Real(x)).collect())
                .collect(),
            ncol,
            random: true,
        }
    }

    /// Append one row.
    pub fn add_row(&mut self, row: Vec<Datum>) -> Result<()> {
        if row.len() != self.ncol {
            return Err(Error::Config(format!(
                "row has {} columns, expected {}",
                row.len(),
                self.ncol
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Mask random access, leaving only sequential scanning.
    pub fn sequential_only(mut self) -> Self {
        self.random = false;
        self
    }
}

impl Table for MemoryTable {
    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    fn column_count(&self) -> usize {
        self.ncol
    }

    fn is_random(&self) -> bool {
        self.random
    }

    fn read_rows(&self) -> Result<Box<dyn RowReader + '_>> {
        Ok(Box::new(MemReader {
            rows: &self.rows,
            next: 0,
            current: 0,
        }))
    }

    fn row_access(&self) -> Result<Box<dyn RowAccess + Send + '_>> {
        if !self.random {
            return Err(Error::Table(
                "table does not provide random access".to_owned(),
            ));
        }
        Ok(Box::new(MemAccess { rows: &self.rows }))
    }
}

struct MemReader<'a> {
    rows: &'a [Vec<Datum>],
    next: usize,
    current: usize,
}

impl RowReader for MemReader<'_> {
    fn advance(&mut self) -> Result<bool> {
        if self.next < self.rows.len() {
            self.current = self.next;
            self.next += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn index(&self) -> u64 {
        self.current as u64
    }

    fn row(&self) -> &[Datum] {
        &self.rows[self.current]
    }
}

struct MemAccess<'a> {
    rows: &'a [Vec<Datum>],
}

impl RowAccess for MemAccess<'_> {
    fn row(&mut self, index: u64) -> Result<&[Datum]> {
        self.rows
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Table(format!("row {index} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_read() {
        let table = MemoryTable::of_reals(&[&[1.0], &[2.0], &[3.0]]);
        let mut reader = table.read_rows().unwrap();
        let mut seen = Vec::new();
        while reader.advance().unwrap() {
            seen.push((reader.index(), reader.row()[0].clone()));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (2, Datum::Real(3.0)));
    }

    #[test]
    fn test_random_access() {
        let table = MemoryTable::of_reals(&[&[1.0], &[2.0]]);
        let mut access = table.row_access().unwrap();
        assert_eq!(access.row(1).unwrap(), &[Datum::Real(2.0)]);
        assert!(access.row(5).is_err());
    }

    #[test]
    fn test_sequential_only_denies_random() {
        let table = MemoryTable::of_reals(&[&[1.0]]).sequential_only();
        assert!(!table.is_random());
        assert!(table.row_access().is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = MemoryTable::from_rows(vec![
            vec![Datum::Real(1.0)],
            vec![Datum::Real(1.0), Datum::Real(2.0)],
        ]);
        assert!(result.is_err());
    }
}
