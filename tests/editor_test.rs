use testsheet::cell::{CellAddress, CellValue, Range};
use testsheet::config::EditorConfig;
use testsheet::editor::{EditEvent, Editor};
use testsheet::evaluator::CYCLE_SENTINEL;
use testsheet::grid::Grid;
use testsheet::selection::{Direction, Key, KeyInput};

fn addr(id: &str) -> CellAddress {
    CellAddress::parse(id).unwrap()
}

fn new_editor() -> Editor {
    Editor::new("sheet", Grid::default(), EditorConfig::default())
}

// Helper function to set a cell the way a user would through the formula bar
fn set_cell(editor: &mut Editor, id: &str, input: &str) {
    editor.click(addr(id));
    editor.set_formula_bar_text(input);
    editor.commit();
}

// Helper function to check a displayed value
fn assert_cell_value(editor: &Editor, id: &str, expected: CellValue) {
    assert_eq!(editor.display_value(addr(id)), expected, "cell {}", id);
    println!("✓ Cell {} displays {}", id, expected);
}

fn raw(editor: &Editor, id: &str) -> String {
    editor.grid().raw_text(addr(id))
}

#[test]
fn test_formulas_recalculate() {
    let mut editor = new_editor();
    set_cell(&mut editor, "A1", "10");
    set_cell(&mut editor, "A2", "20");
    set_cell(&mut editor, "A3", "=SUM(A1:A2)");
    set_cell(&mut editor, "B1", "=A3/A1");
    assert_cell_value(&editor, "A3", CellValue::Number(30.0));
    assert_cell_value(&editor, "B1", CellValue::Number(3.0));

    set_cell(&mut editor, "A1", "5");
    assert_cell_value(&editor, "A3", CellValue::Number(25.0));
    assert_cell_value(&editor, "B1", CellValue::Number(5.0));
}

#[test]
fn test_cycles_display_sentinel() {
    let mut editor = new_editor();
    set_cell(&mut editor, "A1", "=B1");
    set_cell(&mut editor, "B1", "=A1+1");
    assert_cell_value(&editor, "A1", CellValue::Text(CYCLE_SENTINEL.to_string()));
    assert_cell_value(&editor, "B1", CellValue::Text(CYCLE_SENTINEL.to_string()));
}

#[test]
fn test_undo_redo_sequence() {
    let mut editor = new_editor();
    set_cell(&mut editor, "A1", "1");
    set_cell(&mut editor, "A1", "2");
    set_cell(&mut editor, "A1", "3");

    editor.undo();
    assert_eq!(raw(&editor, "A1"), "2");
    println!("✓ Undo restores the state after the previous edit");

    editor.redo();
    assert_eq!(raw(&editor, "A1"), "3");
    println!("✓ Redo restores the undone edit");

    editor.undo();
    set_cell(&mut editor, "B1", "x");
    assert_eq!(editor.redo(), EditEvent::Ignored);
    assert_eq!(raw(&editor, "A1"), "2");
    println!("✓ A new edit after undo invalidates redo");
}

#[test]
fn test_history_is_bounded() {
    let config = EditorConfig {
        history_capacity: 3,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new("sheet", Grid::new(5, 5), config);
    for n in 1..=6 {
        set_cell(&mut editor, "A1", &n.to_string());
    }
    let mut undone = 0;
    while editor.undo() != EditEvent::Ignored {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(raw(&editor, "A1"), "3");
    println!("✓ Only the last 3 edits can be undone");
}

#[test]
fn test_copy_paste_region() {
    let mut editor = new_editor();
    set_cell(&mut editor, "A1", "1");
    set_cell(&mut editor, "B1", "two");
    set_cell(&mut editor, "A2", "=A1*3");
    set_cell(&mut editor, "E5", "keep");

    editor.click(addr("A1"));
    editor.shift_click(addr("B2"));
    assert!(editor.copy());

    editor.click(addr("D4"));
    let event = editor.paste();
    assert!(matches!(event, EditEvent::GridChanged(_)));
    assert_eq!(raw(&editor, "D4"), "1");
    assert_eq!(raw(&editor, "E4"), "two");
    assert_eq!(raw(&editor, "D5"), "=A1*3");
    assert_eq!(raw(&editor, "E5"), "");
    assert_eq!(raw(&editor, "F4"), "");
    assert_eq!(editor.selection().range(), Range::parse("D4:E5"));
    println!("✓ Paste reproduces the copied raw values at the target");
}

#[test]
fn test_cut_then_undo() {
    let mut editor = new_editor();
    set_cell(&mut editor, "A1", "1");
    set_cell(&mut editor, "A2", "2");
    editor.click(addr("A1"));
    editor.shift_click(addr("A2"));
    editor.cut();
    assert_eq!(raw(&editor, "A1"), "");
    editor.click(addr("C1"));
    editor.paste();
    assert_eq!(raw(&editor, "C2"), "2");
    editor.undo();
    editor.undo();
    assert_eq!(raw(&editor, "A2"), "2");
    assert_eq!(raw(&editor, "C2"), "");
    println!("✓ Cut and paste are each one undoable edit");
}

#[test]
fn test_copy_without_range_does_nothing() {
    let mut editor = new_editor();
    assert!(!editor.copy());
    assert_eq!(editor.paste(), EditEvent::Ignored);
    assert!(!editor.history().can_undo());
}

#[test]
fn test_keyboard_session() {
    let mut editor = new_editor();
    for c in "=1+1".chars() {
        editor.handle_key(Key::Char(c).into());
    }
    assert_eq!(editor.formula_bar_text(), "=1+1");
    editor.handle_key(Key::Enter.into());
    assert_eq!(editor.selection().active(), addr("A2"));
    assert_cell_value(&editor, "A1", CellValue::Number(2.0));

    editor.handle_key(KeyInput::new(Key::Arrow(Direction::Up)));
    editor.handle_key(Key::Enter.into());
    editor.handle_key(Key::Backspace.into());
    editor.handle_key(Key::Char('5').into());
    editor.handle_key(Key::Escape.into());
    assert_eq!(raw(&editor, "A1"), "=1+1");
    println!("✓ Escape leaves the stored formula untouched");

    for _ in 0..30 {
        editor.handle_key(KeyInput::new(Key::Arrow(Direction::Down)));
    }
    assert_eq!(editor.selection().active(), addr("A20"));
    println!("✓ Arrow movement is clamped to the grid");
}

#[test]
fn test_formula_bar_mirrors_cell_editor() {
    let mut editor = new_editor();
    editor.click(addr("B2"));
    editor.handle_key(Key::Char('4').into());
    editor.set_formula_bar_text("42");
    editor.handle_key(Key::Char('0').into());
    assert_eq!(editor.formula_bar_text(), "420");
    editor.click(addr("C3"));
    assert_eq!(raw(&editor, "B2"), "420");
    assert!(!editor.selection().is_editing());
    assert_eq!(editor.formula_bar_text(), "");
}
