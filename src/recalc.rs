//! Whole-sheet resolution: evaluates formula cells in dependency order,
//! memoising results and flagging reference cycles.

use crate::cell::{CellAddress, CellValue};
use crate::dependencies::dependency_addresses;
use crate::evaluator::{CYCLE_SENTINEL, evaluate_with};
use crate::functions::{BUILTINS, FunctionTable};
use crate::grid::Grid;
use crate::reference::EvalContext;
use log::debug;
use std::collections::{BTreeSet, HashMap, VecDeque};

pub struct SheetResolver<'a> {
    grid: &'a Grid,
    functions: &'a FunctionTable,
    context: EvalContext,
    resolved: HashMap<CellAddress, CellValue>,
}

impl<'a> SheetResolver<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        SheetResolver::with_functions(grid, &BUILTINS)
    }

    pub fn with_functions(grid: &'a Grid, functions: &'a FunctionTable) -> Self {
        SheetResolver {
            grid,
            functions,
            context: grid.literal_context(),
            resolved: HashMap::new(),
        }
    }

    fn formula_at(&self, cell: CellAddress) -> Option<&'a str> {
        let grid: &'a Grid = self.grid;
        match grid.get_at(cell) {
            Ok(CellValue::Formula(f)) => Some(f.as_str()),
            _ => None,
        }
    }

    /// Displayed value of `cell`: literals as stored, formulas evaluated.
    /// Out-of-bounds cells read as empty.
    pub fn value_of(&mut self, cell: CellAddress) -> CellValue {
        if self.formula_at(cell).is_none() {
            return self.grid.get_at(cell).cloned().unwrap_or_default();
        }
        self.resolve(cell);
        self.resolved.get(&cell).cloned().unwrap_or_default()
    }

    /// Displayed values of the entire grid, row-major.
    pub fn resolve_all(&mut self) -> Vec<Vec<CellValue>> {
        (0..self.grid.rows)
            .map(|row| {
                (0..self.grid.cols)
                    .map(|col| self.value_of(CellAddress::new(row, col)))
                    .collect()
            })
            .collect()
    }

    fn store(&mut self, cell: CellAddress, value: CellValue) {
        self.context.insert(cell.id(), value.clone());
        self.resolved.insert(cell, value);
    }

    // Iterative post-order DFS. `path` holds the chain of cells currently
    // being expanded; reaching one of them again closes a cycle.
    fn resolve(&mut self, start: CellAddress) {
        let mut stack = vec![(start, false)];
        let mut path: Vec<CellAddress> = Vec::new();

        while let Some((cell, expanded)) = stack.pop() {
            if expanded {
                path.pop();
                if !self.resolved.contains_key(&cell) {
                    if let Some(formula) = self.formula_at(cell) {
                        let value = evaluate_with(formula, &self.context, self.functions);
                        self.store(cell, value);
                    }
                }
                continue;
            }
            if self.resolved.contains_key(&cell) {
                continue;
            }
            if let Some(pos) = path.iter().position(|c| *c == cell) {
                let members: Vec<CellAddress> = path[pos..].to_vec();
                debug!(
                    "reference cycle through {}",
                    members.iter().map(CellAddress::id).collect::<Vec<_>>().join(" -> ")
                );
                for member in members {
                    self.store(member, CellValue::Text(CYCLE_SENTINEL.to_string()));
                }
                continue;
            }
            let Some(formula) = self.formula_at(cell) else {
                continue;
            };

            stack.push((cell, true));
            path.push(cell);
            for dep in dependency_addresses(formula) {
                if self.formula_at(dep).is_some() && !self.resolved.contains_key(&dep) {
                    stack.push((dep, false));
                }
            }
        }
    }
}

/// Cells whose displayed value may change after `changed` were edited: the
/// edited cells themselves plus every formula that transitively reads them.
pub fn affected_cells(grid: &Grid, changed: &[CellAddress]) -> BTreeSet<CellAddress> {
    let mut dependents: HashMap<CellAddress, Vec<CellAddress>> = HashMap::new();
    for cell in grid.formula_cells() {
        if let Ok(CellValue::Formula(formula)) = grid.get_at(cell) {
            for dep in dependency_addresses(formula) {
                dependents.entry(dep).or_default().push(cell);
            }
        }
    }

    let mut affected: BTreeSet<CellAddress> = changed.iter().copied().collect();
    let mut queue: VecDeque<CellAddress> = changed.iter().copied().collect();
    while let Some(cell) = queue.pop_front() {
        for &dependent in dependents.get(&cell).into_iter().flatten() {
            if affected.insert(dependent) {
                queue.push_back(dependent);
            }
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ERROR_SENTINEL;

    fn addr(id: &str) -> CellAddress {
        CellAddress::parse(id).unwrap()
    }

    fn put(grid: &mut Grid, id: &str, input: &str) {
        let cell = addr(id);
        grid.set(cell.row, cell.col, CellValue::from_input(input)).unwrap();
    }

    #[test]
    fn test_chained_formulas() {
        let mut grid = Grid::new(5, 5);
        put(&mut grid, "A1", "2");
        put(&mut grid, "A2", "=A1*10");
        put(&mut grid, "A3", "=A2+A1");
        put(&mut grid, "B1", "=SUM(A1:A3)");
        let mut resolver = SheetResolver::new(&grid);
        assert_eq!(resolver.value_of(addr("B1")), CellValue::Number(44.0));
        assert_eq!(resolver.value_of(addr("A3")), CellValue::Number(22.0));
        assert_eq!(resolver.value_of(addr("A1")), CellValue::Number(2.0));
    }

    #[test]
    fn test_cycle_is_flagged() {
        let mut grid = Grid::new(5, 5);
        put(&mut grid, "A1", "=B1+1");
        put(&mut grid, "B1", "=A1+1");
        put(&mut grid, "C1", "=A1");
        put(&mut grid, "D1", "=D1");
        let cycle = CellValue::Text(CYCLE_SENTINEL.to_string());
        let mut resolver = SheetResolver::new(&grid);
        assert_eq!(resolver.value_of(addr("C1")), CellValue::Text(ERROR_SENTINEL.to_string()));
        assert_eq!(resolver.value_of(addr("A1")), cycle);
        assert_eq!(resolver.value_of(addr("B1")), cycle);
        assert_eq!(resolver.value_of(addr("D1")), cycle);
    }

    #[test]
    fn test_resolve_all_snapshot() {
        let mut grid = Grid::new(2, 2);
        put(&mut grid, "A1", "3");
        put(&mut grid, "B2", "=A1^2");
        let snapshot = SheetResolver::new(&grid).resolve_all();
        assert_eq!(snapshot[1][1], CellValue::Number(9.0));
        assert_eq!(snapshot[0][1], CellValue::Empty);
    }

    #[test]
    fn test_affected_cells_transitive() {
        let mut grid = Grid::new(5, 5);
        put(&mut grid, "A2", "=A1+1");
        put(&mut grid, "A3", "=A2*2");
        put(&mut grid, "B1", "=SUM(A1:A3)");
        put(&mut grid, "C1", "=E5");
        let affected = affected_cells(&grid, &[addr("A1")]);
        let expected: BTreeSet<CellAddress> =
            ["A1", "A2", "A3", "B1"].iter().map(|id| addr(id)).collect();
        assert_eq!(affected, expected);
    }

    #[test]
    fn test_affected_cells_tolerates_cycles() {
        let mut grid = Grid::new(3, 3);
        put(&mut grid, "A1", "=B1");
        put(&mut grid, "B1", "=A1");
        assert_eq!(affected_cells(&grid, &[addr("A1")]).len(), 2);
    }
}
