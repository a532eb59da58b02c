//! Variant rule sets layered on top of standard sudoku.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::sudoku::CELLS;

/// A killer cage: its cells hold distinct digits summing to `sum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cage {
    /// Required sum of the cage's digits.
    pub sum: u32,
    /// Cell indices (row-major, `0..81`).
    pub cells: Vec<usize>,
}

impl Cage {
    /// Create a cage.
    pub fn new(sum: u32, cells: Vec<usize>) -> Self {
        Self { sum, cells }
    }

    /// Smallest and largest sums reachable with `n` distinct digits.
    fn sum_bounds(n: usize) -> (u32, u32) {
        let n = n as u32;
        let min = n * (n + 1) / 2;
        let max = (10 - n..=9).sum();
        (min, max)
    }
}

/// Optional rule set passed alongside a puzzle.
///
/// The default (no cages) is standard sudoku.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Killer cages.
    #[serde(default)]
    pub cages: Vec<Cage>,
}

impl Rules {
    /// Builder method to add a cage.
    pub fn with_cage(mut self, sum: u32, cells: Vec<usize>) -> Self {
        self.cages.push(Cage::new(sum, cells));
        self
    }

    /// True if no variant constraint is present.
    pub fn is_standard(&self) -> bool {
        self.cages.is_empty()
    }

    /// Check that the rule set can apply to a 9x9 grid.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut owner: [Option<usize>; CELLS] = [None; CELLS];
        for (id, cage) in self.cages.iter().enumerate() {
            if cage.cells.is_empty() || cage.cells.len() > 9 {
                return Err(CoreError::InvalidRules(format!(
                    "cage {} has {} cells",
                    id,
                    cage.cells.len()
                )));
            }
            let (min, max) = Cage::sum_bounds(cage.cells.len());
            if cage.sum < min || cage.sum > max {
                return Err(CoreError::InvalidRules(format!(
                    "cage {} sum {} outside {}..={}",
                    id, cage.sum, min, max
                )));
            }
            for &cell in &cage.cells {
                if cell >= CELLS {
                    return Err(CoreError::InvalidRules(format!(
                        "cage {} references cell {}",
                        id, cell
                    )));
                }
                if let Some(other) = owner[cell].replace(id) {
                    return Err(CoreError::InvalidRules(format!(
                        "cell {} is in cages {} and {}",
                        cell, other, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cage index for each cell, `None` for cells outside every cage.
    ///
    /// Assumes [`Rules::validate`] passed.
    pub fn cage_map(&self) -> [Option<usize>; CELLS] {
        let mut map = [None; CELLS];
        for (id, cage) in self.cages.iter().enumerate() {
            for &cell in &cage.cells {
                if cell < CELLS {
                    map[cell] = Some(id);
                }
            }
        }
        map
    }
}
