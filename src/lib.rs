/*!
# Test-sheet formula engine

The spreadsheet core behind the test-sheet feature: a formula engine and the
grid-editing state machine the UI drives.

## Overview

Cells hold raw values (numbers, text, booleans, or formula text starting with
`=`). Displayed values are computed on demand: formulas are parsed into a
small AST and evaluated by walking it against a context of already-resolved
cell values. Nothing is compiled or executed dynamically.

## Architecture

### Formula Engine
- **Reference Resolver** (`reference`) - `A1` and `A1:B10` tokens to values
- **Function Library** (`functions`) - math, text, date and logical built-ins
- **Evaluator** (`evaluator`) - formula text to value, `#ERROR!` on any failure
- **Dependency Extractor** (`dependencies`) - cells a formula reads
- **Sheet Resolver** (`recalc`) - whole-sheet evaluation with `#CYCLE!` detection

### Editing Core
- **Grid** (`grid`) - fixed-size 2-D cell store with column headers
- **Selection** (`selection`) - active cell, range, edit mode, shared draft
- **History** (`history`) - bounded undo/redo of whole-grid snapshots
- **Clipboard** (`clipboard`) - rectangular copy, cut and paste
- **Editor** (`editor`) - ties the above together for one open sheet

### Persistence
- **Stores** (`saving`) - `SheetStore` trait, in-memory and gzip + bincode file stores
- **Autosave** (`autosave`) - trailing-edge debounced saving on a tokio task
- **CSV** (`downloader`, `loader`) - lossless export and import of raw contents

## Example

```
use testsheet::cell::CellValue;
use testsheet::evaluator::evaluate;
use testsheet::reference::EvalContext;

let mut context = EvalContext::new();
context.insert("A1".to_string(), CellValue::Number(10.0));
context.insert("B1".to_string(), CellValue::Number(20.0));
assert_eq!(evaluate("=A1+B1", &context), CellValue::Number(30.0));
assert_eq!(evaluate("=SUM(10,20,30)", &context), CellValue::Number(60.0));
```
*/

pub mod autosave;
pub mod cell;
pub mod clipboard;
pub mod config;
pub mod dependencies;
pub mod downloader;
pub mod editor;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod grid;
pub mod history;
pub mod loader;
pub mod parser;
pub mod recalc;
pub mod reference;
pub mod saving;
pub mod selection;
pub mod value;

pub use cell::{CellAddress, CellValue, Range};
pub use config::EditorConfig;
pub use dependencies::get_dependencies;
pub use editor::{EditEvent, Editor};
pub use error::{CsvError, EvalError, GridError, StoreError};
pub use evaluator::{CYCLE_SENTINEL, ERROR_SENTINEL, evaluate};
pub use grid::Grid;
pub use reference::EvalContext;
pub use saving::{FileStore, MemoryStore, SheetStore};
