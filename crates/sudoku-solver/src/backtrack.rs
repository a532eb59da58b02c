//! Builtin solver: depth-first search with bitmask candidates.
//!
//! Cells are picked by fewest remaining candidates. Killer cages prune by
//! distinct digits and reachable sums. Progress is the explored fraction of
//! the search tree, which grows monotonically as the search moves left to
//! right.

use sudoku_core::{Rules, SolveError, Sudoku, CELLS, SIZE};
use tracing::debug;

use crate::error::SolverError;
use crate::module::SolverModule;
use crate::reporter::Reporter;

const ALL_DIGITS: u16 = 0b11_1111_1110;

/// Nodes visited between two cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 256;

/// Depth-first backtracking solver honouring standard rules and killer cages.
#[derive(Debug, Clone, Default)]
pub struct BacktrackSolver;

impl BacktrackSolver {
    /// Create the solver.
    pub fn new() -> Self {
        Self
    }
}

impl SolverModule for BacktrackSolver {
    fn name(&self) -> &str {
        "backtrack"
    }

    fn solve(
        &self,
        puzzle: &Sudoku,
        rules: Option<&Rules>,
        reporter: &mut Reporter,
    ) -> Result<Sudoku, SolverError> {
        if let Some(conflict) = puzzle.find_conflict() {
            return Err(SolveError::InvalidPuzzle(conflict).into());
        }
        let rules = rules.filter(|r| !r.is_standard());
        if let Some(rules) = rules {
            rules.validate().map_err(SolveError::from)?;
        }

        let mut search = Search::new(puzzle, rules, reporter)?;
        let found = search.run(0.0, 1.0)?;
        debug!(
            solver = self.name(),
            nodes = search.nodes,
            found,
            "Search finished"
        );
        if !found {
            return Err(SolveError::Unsatisfiable.into());
        }
        search.reporter.report(1.0);
        Sudoku::from_cells(search.grid)
            .map_err(|e| SolverError::Solve(SolveError::Internal(e.to_string())))
    }
}

#[derive(Debug, Clone, Copy)]
struct CageState {
    target: u32,
    used: u16,
    sum: u32,
    open: u32,
}

impl CageState {
    /// Whether `digit` can go into one of this cage's open cells.
    fn admits(&self, digit: u8) -> bool {
        let bit = 1u16 << digit;
        if self.used & bit != 0 {
            return false;
        }
        let sum = self.sum + digit as u32;
        if sum > self.target {
            return false;
        }
        let left = self.open - 1;
        let remaining = self.target - sum;
        if left == 0 {
            return remaining == 0;
        }
        let avail = ALL_DIGITS & !(self.used | bit);
        let (min, max) = extreme_sums(avail, left);
        (min..=max).contains(&remaining)
    }
}

/// Sums of the `n` smallest and the `n` largest digits in `mask`.
fn extreme_sums(mask: u16, n: u32) -> (u32, u32) {
    let digits: Vec<u32> = digits(mask).map(u32::from).collect();
    if digits.len() < n as usize {
        return (u32::MAX, 0);
    }
    let n = n as usize;
    let min = digits[..n].iter().sum();
    let max = digits[digits.len() - n..].iter().sum();
    (min, max)
}

fn digits(mask: u16) -> impl Iterator<Item = u8> {
    (1..=9u8).filter(move |d| mask & (1 << d) != 0)
}

fn box_of(cell: usize) -> usize {
    (cell / SIZE / 3) * 3 + (cell % SIZE) / 3
}

struct Search<'r> {
    grid: [u8; CELLS],
    rows: [u16; SIZE],
    cols: [u16; SIZE],
    boxes: [u16; SIZE],
    cage_of: [Option<usize>; CELLS],
    cages: Vec<CageState>,
    reporter: &'r mut Reporter,
    nodes: u64,
}

impl<'r> Search<'r> {
    fn new(
        puzzle: &Sudoku,
        rules: Option<&Rules>,
        reporter: &'r mut Reporter,
    ) -> Result<Self, SolverError> {
        let (cage_of, mut cages) = match rules {
            Some(rules) => (
                rules.cage_map(),
                rules
                    .cages
                    .iter()
                    .map(|c| CageState {
                        target: c.sum,
                        used: 0,
                        sum: 0,
                        open: c.cells.len() as u32,
                    })
                    .collect(),
            ),
            None => ([None; CELLS], Vec::new()),
        };

        let mut search = Self {
            grid: [0; CELLS],
            rows: [0; SIZE],
            cols: [0; SIZE],
            boxes: [0; SIZE],
            cage_of,
            cages: Vec::new(),
            reporter,
            nodes: 0,
        };

        for (cell, &digit) in puzzle.cells().iter().enumerate() {
            if digit == 0 {
                continue;
            }
            if let Some(id) = cage_of[cell] {
                let cage = &mut cages[id];
                let bit = 1u16 << digit;
                if cage.used & bit != 0 {
                    return Err(SolveError::InvalidPuzzle(format!(
                        "cage {} repeats digit {}",
                        id, digit
                    ))
                    .into());
                }
                cage.used |= bit;
                cage.sum += digit as u32;
                cage.open -= 1;
            }
            search.mark(cell, digit);
        }

        for (id, cage) in cages.iter().enumerate() {
            let broken = if cage.open == 0 {
                cage.sum != cage.target
            } else {
                cage.sum >= cage.target
            };
            if broken {
                return Err(SolveError::InvalidPuzzle(format!(
                    "givens of cage {} cannot reach sum {}",
                    id, cage.target
                ))
                .into());
            }
        }
        search.cages = cages;
        Ok(search)
    }

    fn mark(&mut self, cell: usize, digit: u8) {
        let bit = 1u16 << digit;
        self.grid[cell] = digit;
        self.rows[cell / SIZE] |= bit;
        self.cols[cell % SIZE] |= bit;
        self.boxes[box_of(cell)] |= bit;
    }

    fn place(&mut self, cell: usize, digit: u8) {
        self.mark(cell, digit);
        if let Some(id) = self.cage_of[cell] {
            let cage = &mut self.cages[id];
            cage.used |= 1 << digit;
            cage.sum += digit as u32;
            cage.open -= 1;
        }
    }

    fn unplace(&mut self, cell: usize, digit: u8) {
        let bit = !(1u16 << digit);
        self.grid[cell] = 0;
        self.rows[cell / SIZE] &= bit;
        self.cols[cell % SIZE] &= bit;
        self.boxes[box_of(cell)] &= bit;
        if let Some(id) = self.cage_of[cell] {
            let cage = &mut self.cages[id];
            cage.used &= bit;
            cage.sum -= digit as u32;
            cage.open += 1;
        }
    }

    fn candidates(&self, cell: usize) -> u16 {
        let taken = self.rows[cell / SIZE] | self.cols[cell % SIZE] | self.boxes[box_of(cell)];
        let mut mask = ALL_DIGITS & !taken;
        if let Some(id) = self.cage_of[cell] {
            let cage = self.cages[id];
            for d in digits(mask) {
                if !cage.admits(d) {
                    mask &= !(1 << d);
                }
            }
        }
        mask
    }

    /// Empty cell with the fewest candidates, `None` when the grid is full.
    fn pick_cell(&self) -> Option<(usize, u16)> {
        let mut best: Option<(usize, u16)> = None;
        for cell in (0..CELLS).filter(|&c| self.grid[c] == 0) {
            let mask = self.candidates(cell);
            let count = mask.count_ones();
            if count == 0 {
                return Some((cell, 0));
            }
            if best.map_or(true, |(_, m)| count < m.count_ones()) {
                best = Some((cell, mask));
            }
        }
        best
    }

    /// Explore the subtree covering `[base, base + width)` of the progress range.
    fn run(&mut self, base: f64, width: f64) -> Result<bool, SolverError> {
        self.nodes += 1;
        if self.nodes % CANCEL_CHECK_INTERVAL == 1 && self.reporter.is_cancelled() {
            return Err(SolverError::Cancelled);
        }
        self.reporter.report(base);

        let Some((cell, mask)) = self.pick_cell() else {
            return Ok(true);
        };
        let count = mask.count_ones();
        if count == 0 {
            return Ok(false);
        }

        let child = width / count as f64;
        for (k, digit) in digits(mask).enumerate() {
            self.place(cell, digit);
            if self.run(base + child * k as f64, child)? {
                return Ok(true);
            }
            self.unplace(cell, digit);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    const PUZZLE: &str =
        "53..7....6..195....98....6.8...6...34..8.3..17...2...6.6....28....419..5....8..79";
    const SOLUTION: &str =
        "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

    fn solve(puzzle: &Sudoku, rules: Option<&Rules>) -> Result<Sudoku, SolverError> {
        BacktrackSolver::new().solve(puzzle, rules, &mut Reporter::silent())
    }

    #[test]
    fn test_solves_classic_puzzle() {
        let puzzle: Sudoku = PUZZLE.parse().unwrap();
        let solution = solve(&puzzle, None).unwrap();
        assert_eq!(solution, SOLUTION.parse().unwrap());
    }

    #[test]
    fn test_solves_empty_grid() {
        let solution = solve(&Sudoku::empty(), None).unwrap();
        assert!(solution.is_solved());
    }

    #[test]
    fn test_fills_single_gap() {
        let mut puzzle: Sudoku = SOLUTION.parse().unwrap();
        puzzle.set(40, 0).unwrap();
        let solution = solve(&puzzle, None).unwrap();
        assert_eq!(solution.get(40), 5);
        assert!(solution.is_solved());
    }

    #[test]
    fn test_rejects_duplicate_in_row() {
        let mut puzzle = Sudoku::empty();
        puzzle.set(0, 3).unwrap();
        puzzle.set(8, 3).unwrap();
        let err = solve(&puzzle, None).unwrap_err();
        assert!(matches!(err, SolverError::Solve(SolveError::InvalidPuzzle(_))));
    }

    #[test]
    fn test_unsatisfiable_without_direct_conflict() {
        // Row 1 leaves 9 as the only option for cell 8, but box 3 already holds a 9.
        let mut puzzle = Sudoku::empty();
        for (cell, digit) in (0..8).zip(1..=8u8) {
            puzzle.set(cell, digit).unwrap();
        }
        puzzle.set(17, 9).unwrap();
        assert!(puzzle.find_conflict().is_none());
        let err = solve(&puzzle, None).unwrap_err();
        assert!(matches!(err, SolverError::Solve(SolveError::Unsatisfiable)));
    }

    #[test]
    fn test_honours_killer_cages() {
        let solution: Sudoku = SOLUTION.parse().unwrap();
        // Cage sums taken from the known solution.
        let rules = Rules::default()
            .with_cage(8, vec![0, 1])
            .with_cage(14, vec![9, 10, 18]);
        let mut puzzle: Sudoku = SOLUTION.parse().unwrap();
        for cell in [0, 1, 9, 10, 18] {
            puzzle.set(cell, 0).unwrap();
        }
        let solved = solve(&puzzle, Some(&rules)).unwrap();
        assert_eq!(solved.get(0) + solved.get(1), 8);
        assert_eq!(solved.get(9) + solved.get(10) + solved.get(18), 14);
        assert!(solved.is_solved());
        assert_eq!(solved, solution);
    }

    #[test]
    fn test_cage_givens_checked() {
        let rules = Rules::default().with_cage(5, vec![0, 1]);
        let mut puzzle = Sudoku::empty();
        puzzle.set(0, 7).unwrap();
        let err = solve(&puzzle, Some(&rules)).unwrap_err();
        assert!(matches!(err, SolverError::Solve(SolveError::InvalidPuzzle(_))));
    }

    #[test]
    fn test_invalid_rules() {
        let rules = Rules::default().with_cage(5, vec![]);
        let err = solve(&Sudoku::empty(), Some(&rules)).unwrap_err();
        assert!(matches!(err, SolverError::Solve(SolveError::InvalidRules(_))));
    }

    #[test]
    fn test_empty_rules_solve_as_standard() {
        let puzzle: Sudoku = PUZZLE.parse().unwrap();
        let solution = solve(&puzzle, Some(&Rules::default())).unwrap();
        assert_eq!(solution, SOLUTION.parse().unwrap());
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut reporter = Reporter::new(0.0, CancellationToken::new(), move |v| {
            sink.lock().unwrap().push(v)
        });
        let puzzle: Sudoku = PUZZLE.parse().unwrap();
        BacktrackSolver::new()
            .solve(&puzzle, None, &mut reporter)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(1.0));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let mut reporter = Reporter::new(0.0, token, |_| {});
        let err = BacktrackSolver::new()
            .solve(&Sudoku::empty(), None, &mut reporter)
            .unwrap_err();
        assert!(matches!(err, SolverError::Cancelled));
    }
}
