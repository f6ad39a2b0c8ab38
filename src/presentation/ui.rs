use crate::application::{App, AppMode};
use crate::domain::CellAddress;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

const ROW_LABEL_WIDTH: usize = 4;

pub fn render_ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_sheet_tabs(f, app, chunks[1]);
    render_grid(f, app, chunks[2]);
    render_status_bar(f, app, chunks[3]);

    if app.mode == AppMode::Help {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let references = app.selected_references();
    let mut text = format!("sheetwalk | {}!{}", app.sheet_name(), app.selected_label());
    if !references.is_empty() {
        text.push_str(&format!(" | refs: {}", references.join(", ")));
    }
    let header = Paragraph::new(text).style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_sheet_tabs(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (index, name) in app.workbook.sheet_names().into_iter().enumerate() {
        let style = if index == app.active_sheet {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", name), style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Number of columns, starting at `scroll_col`, that fit in `available_width`.
fn visible_columns(app: &App, available_width: usize) -> usize {
    let sheet = app.sheet();
    let mut total_width = ROW_LABEL_WIDTH;
    let mut visible_cols = 0;
    for col in app.scroll_col..sheet.cols {
        let col_width = sheet.get_column_width(col);
        if total_width + col_width + 1 > available_width {
            break;
        }
        total_width += col_width + 1;
        visible_cols += 1;
    }
    visible_cols.max(1)
}

fn render_grid(f: &mut Frame, app: &mut App, area: Rect) {
    // borders and the column header row
    let visible_rows = (area.height as usize).saturating_sub(3).max(1);
    let visible_cols = visible_columns(app, (area.width as usize).saturating_sub(2));
    app.update_viewport_size(visible_rows, visible_cols);
    app.ensure_cursor_visible();

    let sheet = app.sheet();
    let last_col = (app.scroll_col + visible_cols).min(sheet.cols);
    let last_row = (app.scroll_row + visible_rows).min(sheet.rows);

    let mut headers = vec![Cell::from("")];
    for col in app.scroll_col..last_col {
        let header_style = if col == app.selected_col {
            Style::default().bg(Color::LightBlue).fg(Color::Black)
        } else {
            Style::default().fg(Color::Yellow)
        };
        headers.push(Cell::from(CellAddress::column_label(col)).style(header_style));
    }

    let mut rows = vec![Row::new(headers).height(1)];

    for row in app.scroll_row..last_row {
        let row_number_style = if row == app.selected_row {
            Style::default().bg(Color::LightBlue).fg(Color::Black)
        } else {
            Style::default().fg(Color::Yellow)
        };
        let mut cells = vec![Cell::from(format!("{}", row + 1)).style(row_number_style)];

        for col in app.scroll_col..last_col {
            let cell_data = sheet.get_cell(row, col);
            let style = if row == app.selected_row && col == app.selected_col {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else if cell_data.value.starts_with('#') && cell_data.formula.is_some() {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            cells.push(Cell::from(cell_data.value).style(style));
        }

        rows.push(Row::new(cells).height(1));
    }

    let mut widths = vec![Constraint::Length(ROW_LABEL_WIDTH as u16)];
    for col in app.scroll_col..last_col {
        widths.push(Constraint::Length(sheet.get_column_width(col) as u16));
    }
    let table = Table::new(rows, widths)
        .block(Block::default().borders(Borders::ALL).title(sheet.name.as_str()))
        .column_spacing(1);

    f.render_widget(table, area);
}

fn status_text(app: &App) -> String {
    match app.mode {
        AppMode::Normal => match &app.status_message {
            Some(status) => status.clone(),
            None => {
                let filename = app.filename.as_deref().unwrap_or("unsaved");
                let cell = app.sheet().get_cell(app.selected_row, app.selected_col);
                format!(
                    "{} | {} | Tab: next sheet | Ctrl+N: new sheet | Ctrl+S: save | F1/?: help | q: quit",
                    filename,
                    cell.input()
                )
            }
        },
        AppMode::Editing => {
            let mut text = format!("Editing: {} (Enter to save, Esc to cancel)", app.input);
            if let Some(status) = &app.status_message {
                text.push_str(&format!(" | {}", status));
            }
            text
        }
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
        AppMode::SaveAs => format!("Save as: {} (Enter to save, Esc to cancel)", app.filename_input),
        AppMode::LoadFile => format!("Load file: {} (Enter to load, Esc to cancel)", app.filename_input),
        AppMode::ExportCsv => format!("Export CSV as: {} (Enter to export, Esc to cancel)", app.filename_input),
        AppMode::ImportCsv => format!("Import CSV from: {} (Enter to import, Esc to cancel)", app.filename_input),
        AppMode::NewSheet => {
            let mut text = format!("New sheet name: {} (Enter to add, Esc to cancel)", app.filename_input);
            if let Some(status) = &app.status_message {
                text.push_str(&format!(" | {}", status));
            }
            text
        }
    }
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let style = match app.mode {
        AppMode::Normal => Style::default(),
        AppMode::Editing | AppMode::ImportCsv => Style::default().fg(Color::Green),
        AppMode::Help => Style::default().fg(Color::Cyan),
        AppMode::SaveAs | AppMode::LoadFile | AppMode::NewSheet => Style::default().fg(Color::Yellow),
        AppMode::ExportCsv => Style::default().fg(Color::Magenta),
    };

    let input = Paragraph::new(status_text(app))
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(style);
    f.render_widget(input, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let visible_text = help_lines[start_line..end_line].join("\n");

    let help_widget = Paragraph::new(visible_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("sheetwalk Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = r#"SHEETWALK FORMULA REFERENCE

=== BASIC CONCEPTS ===
• Formulas start with = (equals sign)
• Anything else is a number (42, 3.14) or text
• Cell references use column letters + row number (A1, B2, AA10)
• Other sheets are named before a ! (Data!A1, 'My Sheet'!B2)
• Function names and cell references are case insensitive
• Numbers are exact decimals: =0.1+0.2 → 0.3

=== OPERATORS ===
+       Addition                    =5+3 → 8, =A1+B1
-       Subtraction / negation      =10-3 → 7, =-A1
*       Multiplication              =4*3 → 12
/       Division                    =15/3 → 5
( )     Grouping                    =(1+2)*3 → 9

=== FUNCTIONS ===
SUM(...)        Sum of values           =SUM(A1:A10, 5)
AVERAGE(...)    Average of values       =AVERAGE(A1:C1)
MIN(...)        Minimum value           =MIN(A1, B1)
MAX(...)        Maximum value           =MAX(Data!A1:A5)
ABS(x)          Absolute value          =ABS(-3) → 3
ROUND(x, n)     Round to n places       =ROUND(2.345, 2) → 2.34
CONCAT(...)     Join text               =CONCAT("a", B1)
LEN(text)       Length of text          =LEN("abc") → 3
UPPER(text)     Upper case              =UPPER("abc") → ABC
LOWER(text)     Lower case              =LOWER("ABC") → abc

Empty cells inside ranges are skipped by numeric functions.

=== RANGES ===
A1:C3           Rectangle from A1 to C3
Data!A1:A10     Range on another sheet

=== ERRORS ===
#VALUE!         Text used as a number, or a range outside a function
#DIV/0!         Division by zero
#REF!           Unknown sheet, or a range over 100,000 cells
#NAME?          Unknown function
#CYCLE!         Cell takes part in a circular reference
#ERROR          The formula could not be parsed

=== SHEETS ===
Tab / Shift+Tab Next / previous sheet
Ctrl+N          Add a new sheet

=== FILE OPERATIONS ===
Ctrl+S          Save workbook (JSON, all sheets)
Ctrl+O          Load workbook
Ctrl+E          Export the current sheet's values to CSV
Ctrl+L / Ctrl+I Import CSV into the current sheet

=== EDITING ===
Enter/F2        Edit selected cell
Delete          Clear selected cell
Ctrl+Z / Ctrl+Y Undo / redo
Ctrl+C / Ctrl+V Copy / paste the cell's input
Arrow keys      Navigate cells (hjkl also work)
= key           Auto-resize column to fit content
+ key           Auto-resize all columns
- / _ keys      Shrink / grow column width
q               Quit

=== HELP NAVIGATION ===
↑↓ or j/k       Scroll one line
Page Up/Down    Scroll 5 lines
Home            Jump to top
Esc/F1/?/q      Close this help window"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};

    fn render_to_text(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render_ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut text = String::new();
        for y in 0..height {
            for x in 0..width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_header_shows_references() {
        let mut app = App::default();
        app.apply_input(app.selected_cell(), "=B1 + Data!A2".to_string()).unwrap();
        let text = render_to_text(&mut app, 100, 20);
        assert!(text.contains("Sheet1!A1"));
        assert!(text.contains("refs: Data!A2, Sheet1!B1"));
    }

    #[test]
    fn test_grid_updates_viewport() {
        let mut app = App::default();
        render_to_text(&mut app, 60, 20);
        // 20 lines minus header, tabs, status bar, borders and column header
        assert_eq!(app.viewport_rows, 12);
        assert_eq!(app.viewport_cols, 6);
    }

    #[test]
    fn test_status_line_in_prompt() {
        let mut app = App::default();
        app.start_new_sheet();
        assert_eq!(status_text(&app), "New sheet name: Sheet2 (Enter to add, Esc to cancel)");
    }
}
