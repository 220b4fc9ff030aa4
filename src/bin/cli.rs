#![cfg(not(tarpaulin_include))]

use testsheet::cell::{CellAddress, Range};
use testsheet::config::EditorConfig;
use testsheet::dependencies::get_dependencies;
use testsheet::downloader::write_csv;
use testsheet::editor::{EditEvent, Editor};
use testsheet::loader::load_csv;
use testsheet::saving::FileStore;
use testsheet::selection::{Direction, Key, KeyInput};

use std::env;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

const VIEW_SIZE: usize = 10;

fn display(editor: &Editor) {
    let grid = editor.grid();
    let values = editor.display_grid();
    let active = editor.selection().active();
    let view_row = active.row / VIEW_SIZE * VIEW_SIZE;
    let view_col = active.col / VIEW_SIZE * VIEW_SIZE;
    let row_end = (view_row + VIEW_SIZE).min(grid.rows);
    let col_end = (view_col + VIEW_SIZE).min(grid.cols);

    print!("{:>5}", "");
    for col in view_col..col_end {
        print!("{:>12}", grid.column_label(col));
    }
    println!();
    for row in view_row..row_end {
        print!("{:>5}", row + 1);
        for col in view_col..col_end {
            let mut text = values[row][col].to_string();
            if text.chars().count() > 11 {
                text = text.chars().take(10).collect::<String>() + "~";
            }
            let marker = if CellAddress::new(row, col) == active { "*" } else { " " };
            print!("{:>11}{}", text, marker);
        }
        println!();
    }
}

fn describe(event: &EditEvent) -> String {
    match event {
        EditEvent::Ignored => "no change".to_string(),
        EditEvent::GridChanged(cells) => format!("ok ({} cells updated)", cells.len()),
        _ => "ok".to_string(),
    }
}

fn arrow(command: &str) -> Option<Direction> {
    match command.to_ascii_lowercase().as_str() {
        "w" => Some(Direction::Up),
        "s" => Some(Direction::Down),
        "a" => Some(Direction::Left),
        "d" => Some(Direction::Right),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let s = Instant::now();
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 && args.len() != 4 {
        eprintln!("Usage: {} <sheet_id> [<rows> <cols>]", args[0]);
        return Ok(());
    }

    let mut config = match env::var("SHEET_CONFIG") {
        Ok(path) => EditorConfig::from_file(path)?,
        Err(_) => EditorConfig::default(),
    };
    if args.len() == 4 {
        let rows: usize = args[2].parse().unwrap_or(0);
        let cols: usize = args[3].parse().unwrap_or(0);
        if !(1..=999).contains(&rows) || !(1..=18278).contains(&cols) {
            eprintln!("Error: Invalid dimensions");
            return Ok(());
        }
        config.default_rows = rows;
        config.default_cols = cols;
    }

    let dir = env::var("SHEET_DIR").unwrap_or_else(|_| "sheets".to_string());
    let store = Arc::new(FileStore::new(dir)?);
    let mut editor = Editor::open(&args[1], store, config)?;

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    let mut show = true;
    loop {
        if show {
            display(&editor);
        }

        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!(
            "[{:.1}] ({}) {} > ",
            elapsed_time,
            status,
            editor.selection().active()
        );
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }

        if command == "help" {
            println!("Commands:");
            println!("  q: Quit");
            println!("  w/a/s/d: Move the active cell (W/A/S/D extends the range)");
            println!("  <cell>=<input>: Set a cell, e.g. B2==SUM(A1:A5) or A1=hello");
            println!("  goto <cell>, select <range>");
            println!("  copy, cut, paste, del, undo, redo");
            println!("  show <cell>: Raw text and value of a cell");
            println!("  deps <cell>: Cells a formula reads");
            println!("  export <file.csv>, import <file.csv>, save");
            println!("  disable_output, enable_output");
            continue;
        }

        let mut words = command.splitn(2, ' ');
        let verb = words.next().unwrap_or_default();
        let rest = words.next().unwrap_or_default().trim();

        status = match verb {
            "q" => break,
            _ if command.len() == 1 && arrow(command).is_some() => {
                let direction = arrow(command).unwrap_or(Direction::Down);
                let shift = command.chars().all(|c| c.is_ascii_uppercase());
                let input = if shift {
                    KeyInput::shifted(Key::Arrow(direction))
                } else {
                    KeyInput::new(Key::Arrow(direction))
                };
                describe(&editor.handle_key(input))
            }
            "disable_output" => {
                show = false;
                String::from("ok")
            }
            "enable_output" => {
                show = true;
                String::from("ok")
            }
            "goto" => match CellAddress::parse(rest) {
                Some(cell) => describe(&editor.click(cell)),
                None => String::from("invalid cell"),
            },
            "select" => match Range::parse(rest) {
                Some(range) => {
                    editor.click(range.top_left());
                    describe(&editor.shift_click(CellAddress::new(range.max_row, range.max_col)))
                }
                None => String::from("invalid range"),
            },
            "copy" => {
                if editor.copy() {
                    String::from("ok")
                } else {
                    String::from("no range selected")
                }
            }
            "cut" => describe(&editor.cut()),
            "paste" => describe(&editor.paste()),
            "del" => describe(&editor.clear_selection()),
            "undo" => describe(&editor.undo()),
            "redo" => describe(&editor.redo()),
            "show" => match CellAddress::parse(rest) {
                Some(cell) => {
                    println!(
                        "{}: {:?} => {}",
                        cell,
                        editor.grid().raw_text(cell),
                        editor.display_value(cell)
                    );
                    String::from("ok")
                }
                None => String::from("invalid cell"),
            },
            "deps" => match CellAddress::parse(rest) {
                Some(cell) => {
                    let deps = get_dependencies(&editor.grid().raw_text(cell));
                    println!("{}", deps.into_iter().collect::<Vec<_>>().join(", "));
                    String::from("ok")
                }
                None => String::from("invalid cell"),
            },
            "export" => match write_csv(editor.grid(), rest) {
                Ok(()) => String::from("ok"),
                Err(e) => format!("export failed: {}", e),
            },
            "import" => match load_csv(rest) {
                Ok(grid) => describe(&editor.replace_grid(grid)),
                Err(e) => format!("import failed: {}", e),
            },
            "save" => match editor.flush().await {
                Ok(()) => String::from("saved"),
                Err(e) => format!("save failed: {}", e),
            },
            _ => match command.split_once('=') {
                Some((cell_name, input)) => match CellAddress::parse(cell_name.trim()) {
                    Some(cell) if editor.grid().in_bounds(cell) => {
                        editor.click(cell);
                        editor.set_formula_bar_text(input);
                        describe(&editor.commit())
                    }
                    _ => String::from("invalid cell"),
                },
                None => String::from("invalid command"),
            },
        };
    }

    if let Err(e) = editor.flush().await {
        eprintln!("final save failed: {}", e);
    }
    editor.close();

    let e = s.elapsed().as_secs_f64();
    println!("Total elapsed time: {:.1} seconds", e);

    Ok(())
}
