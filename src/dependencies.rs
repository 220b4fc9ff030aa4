//! Dependency extraction from formula text.
//!
//! Works on the raw text rather than the AST so malformed formulas still
//! report whatever references they contain.

use crate::cell::{CellAddress, Range};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

/// Ranges larger than this only contribute their two corners.
pub const MAX_DEPENDENCY_RANGE_CELLS: usize = 100_000;

lazy_static! {
    static ref RANGE_REF: Regex = Regex::new(r"\b([A-Z]+[0-9]+):([A-Z]+[0-9]+)\b").unwrap();
    static ref CELL_REF: Regex = Regex::new(r"\b([A-Z]+[0-9]+)\b").unwrap();
}

/// Canonical ids of every cell `formula` refers to.
pub fn get_dependencies(formula: &str) -> BTreeSet<String> {
    dependency_addresses(formula).iter().map(CellAddress::id).collect()
}

pub fn dependency_addresses(formula: &str) -> BTreeSet<CellAddress> {
    let mut deps = BTreeSet::new();
    let script = strip_string_literals(formula);

    for caps in RANGE_REF.captures_iter(&script) {
        let (Some(start), Some(end)) = (CellAddress::parse(&caps[1]), CellAddress::parse(&caps[2])) else {
            continue;
        };
        let range = Range::new(start, end);
        match range.cell_count() {
            Some(n) if n <= MAX_DEPENDENCY_RANGE_CELLS => deps.extend(range.cells()),
            _ => {
                deps.insert(start);
                deps.insert(end);
            }
        }
    }

    let without_ranges = RANGE_REF.replace_all(&script, " ");
    for m in CELL_REF.find_iter(&without_ranges) {
        if without_ranges[m.end()..].trim_start().starts_with('(') {
            continue;
        }
        if let Some(cell) = CellAddress::parse(m.as_str()) {
            deps.insert(cell);
        }
    }

    deps
}

// Blank out the contents of quoted strings, keeping the quotes.
fn strip_string_literals(formula: &str) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut quote: Option<char> = None;

    for ch in formula.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                out.push(ch);
            }
            Some(_) => out.push(' '),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            None => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranges_expand() {
        let deps = get_dependencies("=SUM(A1:A10)+B5*C3");
        assert_eq!(deps.len(), 12);
        for id in ["A1", "A5", "A10", "B5", "C3"] {
            assert!(deps.contains(id), "missing {}", id);
        }
    }

    #[test]
    fn test_no_duplicates() {
        assert_eq!(get_dependencies("=A1+A1+SUM(A1:A2)"), ids(&["A1", "A2"]));
    }

    #[test]
    fn test_strings_and_function_names_ignored() {
        assert_eq!(get_dependencies("=LOG10(B2)&\"A1\"&'C3'"), ids(&["B2"]));
    }

    #[test]
    fn test_oversized_range_keeps_corners() {
        assert_eq!(get_dependencies("=SUM(A1:A200000)"), ids(&["A1", "A200000"]));
    }

    #[test]
    fn test_malformed_formula() {
        assert_eq!(get_dependencies("=SUM(A1:,B2 +"), ids(&["A1", "B2"]));
        assert!(get_dependencies("plain text").is_empty());
    }
}
