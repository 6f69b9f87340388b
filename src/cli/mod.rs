//! CLI module for Quarry
//!
//! Provides command-line interface parsing for the quarry binary and the
//! writers that persist a finished report. Uses clap for argument parsing
//! and owo-colors for colored terminal output.

pub mod output;
pub mod report;

use crate::types::{Depth, Result, Topic};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Quarry - keyword research pipeline
///
/// Researches a topic with three cooperating roles: a keyword specialist,
/// a search analyst and an insights compiler.
#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Quarry - keyword research with LLM and web-search services",
    long_about = "Runs a three-stage research pipeline over a topic:\n\
                  keyword analysis, search analysis and final recommendations.\n\n\
                  Each stage's output is validated before the next stage sees it, and\n\
                  the three reports are written to the output directory.",
    after_help = "EXAMPLES:\n    \
                  quarry research \"AI agents\"                    # Research a topic\n    \
                  quarry research \"AI agents\" --max-sources 3    # Test only the top 3 keywords\n    \
                  quarry config --validate                        # Check quarry.toml and env vars\n    \
                  quarry --config my.toml research \"rust async\"   # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "quarry.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and write the three reports
    Research(ResearchArgs),

    /// Show configuration information
    Config {
        /// Validate the configuration file and referenced environment variables
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ResearchArgs {
    /// The topic to research
    pub topic: String,

    /// What the research should achieve
    #[arg(long)]
    pub objective: Option<String>,

    /// Narrower aspect of the topic to emphasize
    #[arg(long)]
    pub focus: Option<String>,

    /// Background context for the topic
    #[arg(long)]
    pub context: Option<String>,

    /// Research depth (brief, moderate, comprehensive)
    #[arg(long, default_value = "comprehensive")]
    pub depth: Depth,

    /// Upper bound on keywords returned by the keyword specialist
    #[arg(long)]
    pub max_keywords: Option<usize>,

    /// Search locale, e.g. en-US
    #[arg(long)]
    pub locale: Option<String>,

    /// Number of top keywords to test against the search service
    #[arg(long)]
    pub max_sources: Option<usize>,

    /// Wall-clock budget for the whole run, in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Directory to write reports to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Leave the evidence citations out of the written reports
    #[arg(long)]
    pub no_citations: bool,
}

impl ResearchArgs {
    /// Build the validated topic these arguments describe
    pub fn topic(&self) -> Result<Topic> {
        let mut topic = Topic::new(self.topic.as_str())?.with_depth(self.depth);

        if let Some(ref objective) = self.objective {
            topic = topic.with_objective(objective.as_str());
        }
        if let Some(ref focus) = self.focus {
            topic = topic.with_focus(focus.as_str());
        }
        if let Some(ref context) = self.context {
            topic = topic.with_context(context.as_str());
        }
        if let Some(ref locale) = self.locale {
            topic = topic.with_locale(locale.as_str());
        }
        if let Some(max) = self.max_keywords {
            topic = topic.with_max_keywords(max)?;
        }

        Ok(topic)
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_args_build_topic() {
        let cli = Cli::try_parse_from([
            "quarry",
            "research",
            "AI agents",
            "--objective",
            "find gaps",
            "--depth",
            "brief",
            "--max-keywords",
            "12",
            "--locale",
            "en-GB",
        ])
        .unwrap();

        let Commands::Research(args) = cli.command else {
            panic!("expected research command");
        };
        let topic = args.topic().unwrap();
        assert_eq!(topic.subject(), "AI agents");
        assert_eq!(topic.research_objective(), Some("find gaps"));
        assert_eq!(topic.depth(), Depth::Brief);
        assert_eq!(topic.max_keywords(), Some(12));
        assert_eq!(topic.locale(), Some("en-GB"));
    }

    #[test]
    fn test_citations_are_on_by_default() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["quarry", "research", "rust"];
            argv.extend_from_slice(extra);
            match Cli::try_parse_from(argv).unwrap().command {
                Commands::Research(args) => args.no_citations,
                Commands::Config { .. } => panic!("expected research command"),
            }
        };

        assert!(!parse(&[]));
        assert!(parse(&["--no-citations"]));
    }

    #[test]
    fn test_invalid_depth_is_rejected() {
        let result = Cli::try_parse_from(["quarry", "research", "rust", "--depth", "deep"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_keywords_is_invalid_input() {
        let cli =
            Cli::try_parse_from(["quarry", "research", "rust", "--max-keywords", "0"]).unwrap();
        let Commands::Research(args) = cli.command else {
            panic!("expected research command");
        };
        assert!(args.topic().is_err());
    }
}
