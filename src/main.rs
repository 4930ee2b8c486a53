//! EnglishMaster - learn English from the terminal
//!
//! Vocabulary flashcards, grammar lessons and practice, exam drills and
//! AI feedback on writing. Run without arguments to launch the TUI, or use
//! subcommands for CLI mode.
//!
//! Available as the `em` command.

use std::fs::{self, File};
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use englishmaster::cli::commands::{Cli, Commands};
use englishmaster::cli::{auth, config, vocab, word};
use englishmaster::core::config::Config;
use englishmaster::error::Result;
use englishmaster::tui::App;

const LOG_FILE: &str = "englishmaster.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.command.is_none());

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging
///
/// The TUI owns the terminal, so in TUI mode the log goes to a file in the
/// data directory. If that file cannot be opened, logging is skipped.
fn init_logging(tui: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if !tui {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return;
    }

    let file = Config::log_dir().and_then(|dir| {
        fs::create_dir_all(&dir)?;
        Ok(File::create(dir.join(LOG_FILE))?)
    });
    if let Ok(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // No subcommand - launch TUI mode
        None => run_tui().await,

        Some(Commands::Auth(args)) => auth::handle_auth(args.command).await,
        Some(Commands::Config(args)) => config::handle_config(args.command),
        Some(Commands::Vocab(args)) => vocab::handle_vocab(args.command),
        Some(Commands::Word { word }) => word::handle_word(word).await,
    }
}

/// Run the TUI application
async fn run_tui() -> Result<()> {
    let config = Config::load()?;

    let mut app = App::new(config)?;
    let result = app.run().await;
    app.shutdown().await;
    result
}
