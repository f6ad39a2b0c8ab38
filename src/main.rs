//! sheetwalk - terminal spreadsheet
//!
//! Opens the interactive grid by default. The `eval` and `refs`
//! subcommands run the formula engine from the command line.

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use sheetwalk::application::{App, AppMode, Config};
use sheetwalk::domain::{FormulaEvaluator, Workbook};
use sheetwalk::infrastructure::{init_logging, FileRepository};
use sheetwalk::presentation::{render_ui, InputHandler};

#[derive(Parser, Debug)]
#[command(name = "sheetwalk", version, about = "Terminal spreadsheet with cross-sheet formulas")]
struct Cli {
    /// Workbook to open
    file: Option<PathBuf>,

    /// Config file (defaults to $SHEETWALK_CONFIG, then ./sheetwalk.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a formula and print its value
    Eval {
        formula: String,
        /// Sheet that unqualified references resolve against
        #[arg(long)]
        sheet: Option<String>,
        /// Workbook whose cells the formula may reference
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the cell references a formula makes, one per line
    Refs {
        formula: String,
        #[arg(long)]
        sheet: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    init_logging(config.log_file.as_deref())?;
    tracing::debug!("Using config {:?}", config);

    match cli.command {
        Some(Command::Eval { formula, sheet, file }) => run_eval(&config, &formula, sheet, file.as_deref()),
        Some(Command::Refs { formula, sheet }) => {
            let sheet = sheet.unwrap_or_else(|| config.default_sheet_name.clone());
            let evaluator = FormulaEvaluator::with_display_places(config.display_places);
            for reference in evaluator.references(&sheet, &as_formula(&formula))? {
                println!("{}", reference);
            }
            Ok(())
        }
        None => run_tui(config, cli.file.as_deref()),
    }
}

/// Accepts formulas with or without the leading `=`.
fn as_formula(text: &str) -> String {
    if text.starts_with('=') {
        text.to_string()
    } else {
        format!("={}", text)
    }
}

fn run_eval(
    config: &Config,
    formula: &str,
    sheet: Option<String>,
    file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let evaluator = FormulaEvaluator::with_display_places(config.display_places);
    let mut workbook: Workbook = match file {
        Some(path) => FileRepository::load_workbook(path, &evaluator)?.0,
        None => config.new_workbook(),
    };
    let sheet = sheet.unwrap_or_else(|| workbook.sheets[0].name.clone());
    if workbook.sheet_index(&sheet).is_none() {
        workbook.add_sheet(config.new_sheet(sheet.clone()))?;
    }

    let value = evaluator.evaluate_formula(&workbook, &sheet, &as_formula(formula));
    println!("{}", value.display(config.display_places));
    Ok(())
}

fn run_tui(config: Config, file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(config);
    if let Some(path) = file {
        let result = FileRepository::load_workbook(path, &app.evaluator);
        app.set_load_result(result);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("Terminal loop failed: {}", err);
        println!("{err:?}");
    }

    Ok(())
}

/// Draws and dispatches key presses until `q` is pressed in normal mode.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') if app.mode == AppMode::Normal => return Ok(()),
                    _ => InputHandler::handle_key_event(app, key.code, key.modifiers),
                }
            }
        }
    }
}
