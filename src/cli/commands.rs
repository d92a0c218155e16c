use crate::security::UntrustedSource;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// `toolgate` - inspect and resolve untrusted-content tool holds.
#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(version)]
#[command(about = "Tool-execution safety gate for agent sessions.", long_about = None)]
pub struct Cli {
    /// State directory (default: ~/.toolgate)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether a session owes an explicit confirmation
    Status {
        /// Session key (e.g. agent:main:whatsapp:dm:+15550001)
        #[arg(short, long)]
        session: String,

        /// Agent id (default: resolved from the session key)
        #[arg(long)]
        agent: Option<String>,
    },

    /// Record that a session saw untrusted content
    Mark {
        #[arg(short, long)]
        session: String,

        #[arg(long)]
        agent: Option<String>,

        /// Subsystem that observed the content
        #[arg(long, value_enum, default_value_t = SourceArg::Memory)]
        source: SourceArg,

        /// Create the session entry when it does not exist yet
        #[arg(long)]
        create: bool,
    },

    /// Submit an operator reply; only an explicit confirmation clears the hold
    Confirm {
        #[arg(short, long)]
        session: String,

        #[arg(long)]
        agent: Option<String>,

        /// Reply text, e.g. `confirm` or `yes, proceed`
        #[arg(required = true, num_args = 1..)]
        reply: Vec<String>,
    },

    /// Print resolved configuration paths
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Memory,
    Hook,
}

impl From<SourceArg> for UntrustedSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Memory => Self::Memory,
            SourceArg::Hook => Self::Hook,
        }
    }
}
