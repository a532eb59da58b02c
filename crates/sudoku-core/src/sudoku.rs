//! The 9x9 grid shared by puzzles and solutions.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Side length of the grid.
pub const SIZE: usize = 9;

/// Number of cells in the grid.
pub const CELLS: usize = SIZE * SIZE;

/// A 9x9 sudoku grid.
///
/// Each cell holds `0` for empty or a digit `1..=9`. The same type is used
/// for puzzles (partially filled) and solutions (completely filled).
/// On the wire it is a flat array of 81 integers in row-major order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sudoku {
    cells: [u8; CELLS],
}

impl Sudoku {
    /// An all-empty grid.
    pub fn empty() -> Self {
        Self { cells: [0; CELLS] }
    }

    /// Build a grid from raw cells, rejecting values above 9.
    pub fn from_cells(cells: [u8; CELLS]) -> Result<Self, CoreError> {
        if let Some((index, &value)) = cells.iter().enumerate().find(|(_, v)| **v > 9) {
            return Err(CoreError::InvalidCell { index, value });
        }
        Ok(Self { cells })
    }

    /// Raw cells in row-major order.
    pub fn cells(&self) -> &[u8; CELLS] {
        &self.cells
    }

    /// Value at `index`, `0` when empty.
    ///
    /// # Panics
    ///
    /// Panics if `index >= CELLS`, like slice indexing. Use
    /// [`cells`](Self::cells) with `get` for a checked lookup.
    pub fn get(&self, index: usize) -> u8 {
        self.cells[index]
    }

    /// Set the cell at `index`. `0` clears it.
    pub fn set(&mut self, index: usize, digit: u8) -> Result<(), CoreError> {
        if index >= CELLS || digit > 9 {
            return Err(CoreError::InvalidCell {
                index,
                value: digit,
            });
        }
        self.cells[index] = digit;
        Ok(())
    }

    /// Values of row `row`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = u8> + '_ {
        self.cells[row * SIZE..(row + 1) * SIZE].iter().copied()
    }

    /// Values of column `col`.
    pub fn col(&self, col: usize) -> impl Iterator<Item = u8> + '_ {
        (0..SIZE).map(move |row| self.cells[row * SIZE + col])
    }

    /// Values of 3x3 box `b`, boxes numbered left-to-right, top-to-bottom.
    pub fn boxed(&self, b: usize) -> impl Iterator<Item = u8> + '_ {
        Self::box_cells(b).map(move |i| self.cells[i])
    }

    /// Cell indices of box `b`.
    pub fn box_cells(b: usize) -> impl Iterator<Item = usize> {
        let top = (b / 3) * 3;
        let left = (b % 3) * 3;
        (0..SIZE).map(move |i| (top + i / 3) * SIZE + left + i % 3)
    }

    /// Number of empty cells.
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v == 0).count()
    }

    /// True if no cell is empty.
    pub fn is_full(&self) -> bool {
        self.empty_count() == 0
    }

    /// First unit (row, column or box) holding a digit twice, if any.
    ///
    /// Empty cells are ignored, so this works on partial grids.
    pub fn find_conflict(&self) -> Option<String> {
        for i in 0..SIZE {
            if has_duplicate(self.row(i)) {
                return Some(format!("row {} repeats a digit", i + 1));
            }
            if has_duplicate(self.col(i)) {
                return Some(format!("column {} repeats a digit", i + 1));
            }
            if has_duplicate(self.boxed(i)) {
                return Some(format!("box {} repeats a digit", i + 1));
            }
        }
        None
    }

    /// True if the grid is full and every row, column and box holds 1-9
    /// exactly once.
    pub fn is_solved(&self) -> bool {
        self.is_full() && self.find_conflict().is_none()
    }

    /// True if every given of `puzzle` has the same value here.
    pub fn is_consistent_with(&self, puzzle: &Sudoku) -> bool {
        puzzle
            .cells
            .iter()
            .zip(self.cells.iter())
            .all(|(&given, &value)| given == 0 || given == value)
    }
}

fn has_duplicate(values: impl Iterator<Item = u8>) -> bool {
    let mut seen = 0u16;
    for v in values.filter(|&v| v != 0) {
        let bit = 1 << v;
        if seen & bit != 0 {
            return true;
        }
        seen |= bit;
    }
    false
}

impl Default for Sudoku {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromStr for Sudoku {
    type Err = CoreError;

    /// Parse an 81-character line. Digits `1-9` are givens; any other
    /// character (`0`, `.`, `_`) is an empty cell.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let len = s.chars().count();
        if len != CELLS {
            return Err(CoreError::InvalidLength(len));
        }
        let mut cells = [0u8; CELLS];
        for (cell, ch) in cells.iter_mut().zip(s.chars()) {
            if let Some(d) = ch.to_digit(10) {
                *cell = d as u8;
            }
        }
        Ok(Self { cells })
    }
}

impl fmt::Debug for Sudoku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line: String = self
            .cells
            .iter()
            .map(|&v| if v == 0 { '.' } else { char::from(b'0' + v) })
            .collect();
        f.debug_tuple("Sudoku").field(&line).finish()
    }
}

impl fmt::Display for Sudoku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIZE {
            if row % 3 == 0 {
                writeln!(f, "+-------+-------+-------+")?;
            }
            for (col, v) in self.row(row).enumerate() {
                if col % 3 == 0 {
                    write!(f, "| ")?;
                }
                if v == 0 {
                    write!(f, ". ")?;
                } else {
                    write!(f, "{} ", v)?;
                }
            }
            writeln!(f, "|")?;
        }
        write!(f, "+-------+-------+-------+")
    }
}

impl Serialize for Sudoku {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.cells.iter())
    }
}

impl<'de> Deserialize<'de> for Sudoku {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cells: Vec<u8> = Vec::deserialize(deserializer)?;
        let cells: [u8; CELLS] = cells
            .try_into()
            .map_err(|v: Vec<u8>| de::Error::custom(CoreError::InvalidLength(v.len())))?;
        Sudoku::from_cells(cells).map_err(de::Error::custom)
    }
}
