//! CLI command definitions using clap
//!
//! Defines the command structure for the `em` CLI tool.

use clap::{Parser, Subcommand, ValueEnum};

/// EnglishMaster - learn English from the terminal
///
/// Vocabulary flashcards, grammar practice, exam drills and AI feedback.
/// Run without arguments to launch the TUI mode.
#[derive(Parser, Debug)]
#[command(name = "em", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in to your EnglishMaster account
    Auth(AuthArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Browse the built-in vocabulary
    Vocab(VocabArgs),

    /// Look up a word with the AI dictionary
    Word {
        /// Word or phrase to look up
        word: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication commands
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Create a new account
    Signup {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Name shown to other learners (prompted when omitted)
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out and remove the stored session
    Logout,
    /// Show current authentication status
    Status,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration commands
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key
        key: ConfigKey,

        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: ConfigKey,
    },

    /// Remove a configuration value
    Remove {
        /// Configuration key
        key: ConfigKey,
    },
}

/// Available configuration keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Gemini API key
    #[value(name = "gemini-key")]
    GeminiKey,

    /// Gemini model selection
    #[value(name = "gemini-model")]
    GeminiModel,

    /// Target number of words per study module
    #[value(name = "module-size")]
    ModuleSize,

    /// Firebase web API key
    #[value(name = "firebase-api-key")]
    FirebaseApiKey,

    /// Firebase project id
    #[value(name = "firebase-project")]
    FirebaseProject,
}

// ─────────────────────────────────────────────────────────────────────────────
// Vocab Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Vocabulary commands
#[derive(Parser, Debug)]
pub struct VocabArgs {
    #[command(subcommand)]
    pub command: VocabCommand,
}

#[derive(Subcommand, Debug)]
pub enum VocabCommand {
    /// List the units of the built-in curriculum
    Units,

    /// Show how a unit is split into study modules
    Modules {
        /// Unit name, or the start of it (e.g. "Unit 1")
        unit: String,

        /// Words per module (defaults to the configured module size)
        #[arg(long, short)]
        size: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["em"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_config_keys() {
        let cli = Cli::try_parse_from(["em", "config", "set", "module-size", "15"]).unwrap();
        match cli.command {
            Some(Commands::Config(ConfigArgs {
                command: ConfigCommand::Set { key, value },
            })) => {
                assert_eq!(key, ConfigKey::ModuleSize);
                assert_eq!(value, "15");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
        assert!(Cli::try_parse_from(["em", "config", "get", "openai-key"]).is_err());
    }

    #[test]
    fn test_parse_vocab_modules() {
        let cli = Cli::try_parse_from(["em", "vocab", "modules", "Unit 1", "--size", "5"]).unwrap();
        match cli.command {
            Some(Commands::Vocab(VocabArgs {
                command: VocabCommand::Modules { unit, size },
            })) => {
                assert_eq!(unit, "Unit 1");
                assert_eq!(size, Some(5));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }
}
