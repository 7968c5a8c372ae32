use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "reel",
    version,
    about = "Page through a subject's video listing and resolve playable embeds",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site origin, overriding the configured one
    #[arg(long, global = true, env = "REEL_ORIGIN")]
    pub origin: Option<String>,

    /// Request timeout in seconds, overriding the configured one
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Retries after a rejected session, overriding the configured value
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Bypass the page cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress everything but errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one page of a subject's listing
    Page {
        /// Subject identifier, as it appears in the landing page path
        subject: String,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Also resolve the embed of every record on the page
        #[arg(short, long)]
        resolve: bool,

        /// Embed resolutions running at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Resolve a watch page into a playable reference
    Resolve {
        /// Watch page URL
        url: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Unpack `eval(function(p,a,c,k,e,d)...)` scripts read from a file or stdin
    Unpack {
        /// Input file; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show or reset configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long)]
        reset: bool,
    },
}

impl Commands {
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Commands::Page { output, .. }
            | Commands::Resolve { output, .. }
            | Commands::Unpack { output, .. } => Some(*output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored output
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonCompact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_page() {
        let args = Args::try_parse_from(["reel", "page", "alice", "-p", "3", "-o", "json-compact"])
            .unwrap();
        match &args.command {
            Commands::Page {
                subject,
                page,
                resolve,
                ..
            } => {
                assert_eq!(subject, "alice");
                assert_eq!(*page, 3);
                assert!(!resolve);
            }
            _ => panic!("expected page command"),
        }
        assert_eq!(args.command.output_format(), Some(OutputFormat::JsonCompact));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["reel", "-v", "-q", "config", "--show"]).is_err());
    }
}
