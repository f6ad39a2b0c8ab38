//! Application state management for the terminal spreadsheet.
//!
//! This module contains the main application state and mode management
//! for the terminal user interface.

use crate::application::Config;
use crate::domain::{CellAddress, CellRef, DomainError, FormulaEvaluator, Sheet, Workbook};
use crate::infrastructure::InfrastructureResult;
use std::collections::VecDeque;

const DEFAULT_WORKBOOK_FILE: &str = "workbook.sheetwalk";
const DEFAULT_CSV_FILE: &str = "sheet.csv";
const MAX_UNDO_STACK_SIZE: usize = 100;

/// Represents the current mode of the application.
///
/// The application can be in different modes that determine how user input
/// is interpreted and what UI elements are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Normal navigation mode - arrow keys move selection, shortcuts available
    Normal,
    /// Cell editing mode - user is typing into a cell
    Editing,
    /// Help screen is displayed
    Help,
    SaveAs,
    LoadFile,
    ExportCsv,
    ImportCsv,
    /// Prompting for the name of a new sheet
    NewSheet,
}

/// Represents an action that can be undone/redone.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// A cell's typed input changed; empty input means the cell was empty.
    CellModified {
        cell: CellRef,
        old_input: String,
        new_input: String,
    },
}

/// Main application state containing the workbook and UI state.
///
/// # Examples
///
/// ```
/// use sheetwalk::application::App;
///
/// let app = App::default();
/// assert_eq!(app.selected_row, 0);
/// assert_eq!(app.sheet_name(), "Sheet1");
/// ```
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub workbook: Workbook,
    pub evaluator: FormulaEvaluator,
    /// Index of the sheet shown in the grid
    pub active_sheet: usize,
    /// Currently selected row (zero-based)
    pub selected_row: usize,
    /// Currently selected column (zero-based)
    pub selected_col: usize,
    /// Top-left row visible in the viewport
    pub scroll_row: usize,
    /// Left-most column visible in the viewport
    pub scroll_col: usize,
    pub mode: AppMode,
    /// Current input buffer (for editing mode)
    pub input: String,
    /// Cursor position within the active input buffer, in characters
    pub cursor_position: usize,
    /// Current filename (if the workbook has been saved/loaded)
    pub filename: Option<String>,
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Input buffer for filename and sheet name prompts
    pub filename_input: String,
    pub undo_stack: VecDeque<UndoAction>,
    pub redo_stack: VecDeque<UndoAction>,
    pub viewport_rows: usize,
    pub viewport_cols: usize,
}

impl Default for App {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            workbook: config.new_workbook(),
            evaluator: FormulaEvaluator::with_display_places(config.display_places),
            config,
            active_sheet: 0,
            selected_row: 0,
            selected_col: 0,
            scroll_row: 0,
            scroll_col: 0,
            mode: AppMode::Normal,
            input: String::new(),
            cursor_position: 0,
            filename: None,
            help_scroll: 0,
            status_message: None,
            filename_input: String::new(),
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            viewport_rows: 20,
            viewport_cols: 8,
        }
    }

    pub fn sheet(&self) -> &Sheet {
        &self.workbook.sheets[self.active_sheet]
    }

    pub fn sheet_mut(&mut self) -> &mut Sheet {
        &mut self.workbook.sheets[self.active_sheet]
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet().name
    }

    pub fn selected_cell(&self) -> CellRef {
        CellRef::new(self.sheet_name(), self.selected_row, self.selected_col)
    }

    pub fn selected_label(&self) -> String {
        CellAddress::new(self.selected_row, self.selected_col).to_string()
    }

    /// References made by the selected cell's formula, as `Sheet!A1` text.
    pub fn selected_references(&self) -> Vec<String> {
        let cell = self.sheet().get_cell(self.selected_row, self.selected_col);
        match cell.formula {
            Some(formula) => self
                .evaluator
                .references(self.sheet_name(), &formula)
                .map(|refs| refs.into_iter().collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Switches to editing mode for the currently selected cell.
    ///
    /// Loads the cell's formula (if present) or value into the input buffer
    /// and positions the cursor at the end.
    pub fn start_editing(&mut self) {
        self.mode = AppMode::Editing;
        let cell = self.sheet().get_cell(self.selected_row, self.selected_col);
        self.input = cell.input().to_string();
        self.cursor_position = self.input.chars().count();
    }

    /// Completes editing and stores the input in the selected cell.
    ///
    /// A formula that would create a circular reference is refused; the app
    /// stays in editing mode so the user can fix it.
    pub fn finish_editing(&mut self) {
        let input = self.input.clone();
        if let Err(e) = self.apply_input(self.selected_cell(), input) {
            self.status_message = Some(e.to_string());
            return;
        }

        if self.selected_row + 1 < self.sheet().rows {
            self.selected_row += 1;
            self.ensure_cursor_visible();
        }

        self.mode = AppMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn cancel_editing(&mut self) {
        self.mode = AppMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Stores typed input in a cell, recording the change for undo.
    pub fn apply_input(&mut self, cell: CellRef, input: String) -> Result<(), DomainError> {
        let previous = self.evaluator.set_cell_input(&mut self.workbook, &cell, &input)?;
        let old_input = previous.input().to_string();
        if old_input != input {
            self.record_action(UndoAction::CellModified {
                cell,
                old_input,
                new_input: input,
            });
        }
        Ok(())
    }

    pub fn clear_selected_cell(&mut self) {
        if let Err(e) = self.apply_input(self.selected_cell(), String::new()) {
            self.status_message = Some(e.to_string());
        }
    }

    fn record_action(&mut self, action: UndoAction) {
        self.undo_stack.push_back(action);
        if self.undo_stack.len() > MAX_UNDO_STACK_SIZE {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    /// Reverts the last cell change and moves it to the redo stack.
    pub fn undo(&mut self) {
        let Some(action) = self.undo_stack.pop_back() else {
            self.status_message = Some("Nothing to undo".to_string());
            return;
        };
        let UndoAction::CellModified { cell, old_input, .. } = &action;
        match self.evaluator.set_cell_input(&mut self.workbook, cell, old_input) {
            Ok(_) => self.redo_stack.push_back(action),
            Err(e) => self.status_message = Some(format!("Undo failed: {}", e)),
        }
    }

    /// Reapplies the last undone change and moves it back to the undo stack.
    pub fn redo(&mut self) {
        let Some(action) = self.redo_stack.pop_back() else {
            self.status_message = Some("Nothing to redo".to_string());
            return;
        };
        let UndoAction::CellModified { cell, new_input, .. } = &action;
        match self.evaluator.set_cell_input(&mut self.workbook, cell, new_input) {
            Ok(_) => self.undo_stack.push_back(action),
            Err(e) => self.status_message = Some(format!("Redo failed: {}", e)),
        }
    }

    fn start_prompt(&mut self, mode: AppMode, initial: String) {
        self.mode = mode;
        self.filename_input = initial;
        self.cursor_position = self.filename_input.chars().count();
        self.status_message = None;
    }

    fn end_prompt(&mut self, status: String) {
        self.status_message = Some(status);
        self.mode = AppMode::Normal;
        self.filename_input.clear();
        self.cursor_position = 0;
    }

    pub fn cancel_filename_input(&mut self) {
        self.mode = AppMode::Normal;
        self.filename_input.clear();
        self.cursor_position = 0;
    }

    /// Prompt text, or `default` when the prompt was left empty.
    fn prompt_or(&self, default: &str) -> String {
        if self.filename_input.trim().is_empty() {
            default.to_string()
        } else {
            self.filename_input.trim().to_string()
        }
    }

    pub fn start_save_as(&mut self) {
        let initial = self.filename.clone().unwrap_or_else(|| DEFAULT_WORKBOOK_FILE.to_string());
        self.start_prompt(AppMode::SaveAs, initial);
    }

    pub fn start_load_file(&mut self) {
        let initial = self.filename.clone().unwrap_or_else(|| DEFAULT_WORKBOOK_FILE.to_string());
        self.start_prompt(AppMode::LoadFile, initial);
    }

    pub fn get_save_filename(&self) -> String {
        self.prompt_or(DEFAULT_WORKBOOK_FILE)
    }

    pub fn get_load_filename(&self) -> String {
        self.prompt_or(DEFAULT_WORKBOOK_FILE)
    }

    pub fn set_save_result(&mut self, result: InfrastructureResult<String>) {
        let status = match result {
            Ok(filename) => {
                self.filename = Some(filename.clone());
                format!("Saved to {}", filename)
            }
            Err(error) => format!("Save failed: {}", error),
        };
        self.end_prompt(status);
    }

    /// Replaces the workbook with a loaded one and resets the view.
    pub fn set_load_result(&mut self, result: InfrastructureResult<(Workbook, String)>) {
        let status = match result {
            Ok((workbook, filename)) => {
                self.workbook = workbook;
                self.filename = Some(filename.clone());
                self.reset_view();
                format!("Loaded from {}", filename)
            }
            Err(error) => format!("Load failed: {}", error),
        };
        self.end_prompt(status);
    }

    pub fn start_csv_export(&mut self) {
        let initial = format!("{}.csv", self.sheet_name());
        self.start_prompt(AppMode::ExportCsv, initial);
    }

    pub fn get_csv_export_filename(&self) -> String {
        self.prompt_or(DEFAULT_CSV_FILE)
    }

    pub fn set_csv_export_result(&mut self, result: InfrastructureResult<String>) {
        let status = match result {
            Ok(filename) => format!("Exported {} to {}", self.sheet_name(), filename),
            Err(error) => format!("Export failed: {}", error),
        };
        self.end_prompt(status);
    }

    pub fn start_csv_import(&mut self) {
        self.start_prompt(AppMode::ImportCsv, DEFAULT_CSV_FILE.to_string());
    }

    pub fn get_csv_import_filename(&self) -> String {
        self.prompt_or(DEFAULT_CSV_FILE)
    }

    /// Replaces the active sheet's contents with an imported sheet.
    pub fn set_csv_import_result(&mut self, result: InfrastructureResult<Sheet>) {
        let status = match result {
            Ok(mut sheet) => {
                sheet.name = self.sheet_name().to_string();
                *self.sheet_mut() = sheet;
                self.evaluator.recalculate_all(&mut self.workbook);
                self.undo_stack.clear();
                self.redo_stack.clear();
                self.selected_row = 0;
                self.selected_col = 0;
                self.scroll_row = 0;
                self.scroll_col = 0;
                format!("CSV data imported into {}", self.sheet_name())
            }
            Err(error) => format!("Import failed: {}", error),
        };
        self.end_prompt(status);
    }

    pub fn start_new_sheet(&mut self) {
        let initial = format!("Sheet{}", self.workbook.sheets.len() + 1);
        self.start_prompt(AppMode::NewSheet, initial);
    }

    /// Adds a sheet named by the prompt and switches to it.
    pub fn finish_new_sheet(&mut self) {
        let name = self.filename_input.trim().to_string();
        let sheet = self.config.new_sheet(name.clone());
        match self.workbook.add_sheet(sheet) {
            Ok(index) => {
                self.select_sheet(index);
                self.evaluator.recalculate_all(&mut self.workbook);
                self.end_prompt(format!("Added sheet {}", name));
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn next_sheet(&mut self) {
        let next = (self.active_sheet + 1) % self.workbook.sheets.len();
        self.select_sheet(next);
    }

    pub fn previous_sheet(&mut self) {
        let count = self.workbook.sheets.len();
        self.select_sheet((self.active_sheet + count - 1) % count);
    }

    fn select_sheet(&mut self, index: usize) {
        if index < self.workbook.sheets.len() {
            self.active_sheet = index;
            self.selected_row = self.selected_row.min(self.sheet().rows.saturating_sub(1));
            self.selected_col = self.selected_col.min(self.sheet().cols.saturating_sub(1));
            self.ensure_cursor_visible();
        }
    }

    fn reset_view(&mut self) {
        self.active_sheet = 0;
        self.selected_row = 0;
        self.selected_col = 0;
        self.scroll_row = 0;
        self.scroll_col = 0;
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Raw input of the selected cell, for the clipboard.
    pub fn selected_input(&self) -> String {
        self.sheet()
            .get_cell(self.selected_row, self.selected_col)
            .input()
            .to_string()
    }

    pub fn set_copy_result(&mut self, result: InfrastructureResult<()>) {
        self.status_message = Some(match result {
            Ok(()) => format!("Copied {}", self.selected_label()),
            Err(e) => e.to_string(),
        });
    }

    pub fn set_paste_result(&mut self, result: InfrastructureResult<String>) {
        match result {
            Ok(text) => match self.apply_input(self.selected_cell(), text) {
                Ok(()) => self.status_message = Some(format!("Pasted into {}", self.selected_label())),
                Err(e) => self.status_message = Some(e.to_string()),
            },
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn move_selection(&mut self, row_delta: isize, col_delta: isize) {
        let max_row = self.sheet().rows.saturating_sub(1);
        let max_col = self.sheet().cols.saturating_sub(1);
        self.selected_row = self.selected_row.saturating_add_signed(row_delta).min(max_row);
        self.selected_col = self.selected_col.saturating_add_signed(col_delta).min(max_col);
        self.ensure_cursor_visible();
    }

    pub fn update_viewport_size(&mut self, rows: usize, cols: usize) {
        self.viewport_rows = rows.max(1);
        self.viewport_cols = cols.max(1);
    }

    /// Ensures the selected cell is visible by adjusting scroll position.
    pub fn ensure_cursor_visible(&mut self) {
        if self.selected_row < self.scroll_row {
            self.scroll_row = self.selected_row;
        } else if self.selected_row >= self.scroll_row + self.viewport_rows {
            self.scroll_row = self.selected_row.saturating_sub(self.viewport_rows - 1);
        }

        if self.selected_col < self.scroll_col {
            self.scroll_col = self.selected_col;
        } else if self.selected_col >= self.scroll_col + self.viewport_cols {
            self.scroll_col = self.selected_col.saturating_sub(self.viewport_cols - 1);
        }
    }
}
