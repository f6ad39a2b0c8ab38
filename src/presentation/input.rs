use crate::application::{App, AppMode};
use crate::infrastructure::{ClipboardService, CsvExporter, FileRepository};
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Normal => Self::handle_normal_mode(app, key, modifiers),
            AppMode::Editing => Self::handle_editing_mode(app, key),
            AppMode::Help => Self::handle_help_mode(app, key),
            AppMode::SaveAs
            | AppMode::LoadFile
            | AppMode::ExportCsv
            | AppMode::ImportCsv
            | AppMode::NewSheet => Self::handle_prompt_mode(app, key),
        }
    }

    fn handle_normal_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('s') => app.start_save_as(),
                KeyCode::Char('o') => app.start_load_file(),
                KeyCode::Char('e') => app.start_csv_export(),
                KeyCode::Char('i') | KeyCode::Char('l') => app.start_csv_import(),
                KeyCode::Char('n') => app.start_new_sheet(),
                KeyCode::Char('z') => app.undo(),
                KeyCode::Char('y') => app.redo(),
                KeyCode::Char('c') => {
                    let result = ClipboardService::copy_text(&app.selected_input());
                    app.set_copy_result(result);
                }
                KeyCode::Char('v') => {
                    let result = ClipboardService::paste_text();
                    app.set_paste_result(result);
                }
                _ => {}
            }
            return;
        }

        app.status_message = None;

        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => app.move_selection(1, 0),
            KeyCode::Left | KeyCode::Char('h') => app.move_selection(0, -1),
            KeyCode::Right | KeyCode::Char('l') => app.move_selection(0, 1),
            KeyCode::Tab => app.next_sheet(),
            KeyCode::BackTab => app.previous_sheet(),
            KeyCode::Enter | KeyCode::F(2) => app.start_editing(),
            KeyCode::Char('=') => {
                let col = app.selected_col;
                app.sheet_mut().auto_resize_column(col);
            }
            KeyCode::Char('+') => app.sheet_mut().auto_resize_all_columns(),
            KeyCode::Char('-') => {
                let col = app.selected_col;
                let current_width = app.sheet().get_column_width(col);
                if current_width > 3 {
                    app.sheet_mut().set_column_width(col, current_width - 1);
                }
            }
            KeyCode::Char('_') => {
                let col = app.selected_col;
                let current_width = app.sheet().get_column_width(col);
                app.sheet_mut().set_column_width(col, current_width + 1);
            }
            KeyCode::F(1) | KeyCode::Char('?') => {
                app.mode = AppMode::Help;
                app.help_scroll = 0;
            }
            KeyCode::Delete | KeyCode::Backspace => app.clear_selected_cell(),
            // 'q' is handled by the main loop
            _ => {}
        }
    }

    fn handle_editing_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => app.finish_editing(),
            KeyCode::Esc => app.cancel_editing(),
            _ => edit_line(&mut app.input, &mut app.cursor_position, key),
        }
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.mode = AppMode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_prompt_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => Self::submit_prompt(app),
            KeyCode::Esc => app.cancel_filename_input(),
            _ => edit_line(&mut app.filename_input, &mut app.cursor_position, key),
        }
    }

    fn submit_prompt(app: &mut App) {
        match app.mode {
            AppMode::SaveAs => {
                let filename = app.get_save_filename();
                let result = FileRepository::save_workbook(&app.workbook, &filename);
                app.set_save_result(result);
            }
            AppMode::LoadFile => {
                let filename = app.get_load_filename();
                let result = FileRepository::load_workbook(&filename, &app.evaluator);
                app.set_load_result(result);
            }
            AppMode::ExportCsv => {
                let filename = app.get_csv_export_filename();
                let result = CsvExporter::export_sheet(app.sheet(), &filename);
                app.set_csv_export_result(result);
            }
            AppMode::ImportCsv => {
                let filename = app.get_csv_import_filename();
                let result = CsvExporter::import_sheet(
                    &filename,
                    app.sheet_name(),
                    app.config.rows,
                    app.config.cols,
                    app.config.default_column_width,
                );
                app.set_csv_import_result(result);
            }
            AppMode::NewSheet => app.finish_new_sheet(),
            AppMode::Normal | AppMode::Editing | AppMode::Help => {}
        }
    }
}

/// Applies a line-editing key to `buffer`, with `cursor` counted in chars.
fn edit_line(buffer: &mut String, cursor: &mut usize, key: KeyCode) {
    let len = buffer.chars().count();
    *cursor = (*cursor).min(len);
    match key {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                buffer.remove(byte_offset(buffer, *cursor));
            }
        }
        KeyCode::Delete => {
            if *cursor < len {
                buffer.remove(byte_offset(buffer, *cursor));
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(len),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = len,
        KeyCode::Char(c) => {
            buffer.insert(byte_offset(buffer, *cursor), c);
            *cursor += 1;
        }
        _ => {}
    }
}

fn byte_offset(s: &str, char_pos: usize) -> usize {
    s.char_indices().nth(char_pos).map_or(s.len(), |(i, _)| i)
}
