//! # Quarry - keyword research pipeline
//!
//! Quarry researches a topic by running three cooperating roles in a fixed
//! order, each backed by an LLM service and, for the middle stage, a web
//! search service:
//!
//! 1. **Keyword specialist** - expands the topic into scored, typed keywords
//! 2. **Search analyst** - searches the top keywords concurrently, merges and
//!    clusters the hits, and asks the LLM to rank and describe them
//! 3. **Insights compiler** - turns keywords and findings into prioritized,
//!    evidence-backed recommendations
//!
//! Every role output is validated before the next role sees it. Failed
//! attempts are retried with exponential backoff, bounded by a per-run
//! deadline.
//!
//! ## Library usage
//!
//! ```rust,ignore
//! use quarry::{LlmProvider, Orchestrator, OrchestratorSettings, SearchProvider, Topic};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = LlmProvider::Ollama {
//!         base_url: "http://localhost:11434".to_string(),
//!         model: "llama3.2:3b".to_string(),
//!         temperature: 0.7,
//!         request_timeout: Duration::from_secs(120),
//!     }
//!     .create_client()?;
//!     let search = SearchProvider::DuckDuckGo.create_client()?;
//!
//!     let orchestrator = Orchestrator::new(llm, search, OrchestratorSettings::default());
//!     let topic = Topic::new("AI agents")?.with_objective("find content gaps");
//!     let report = orchestrator.run(topic, Duration::from_secs(300)).await?;
//!
//!     println!("{}", report.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI API and compatible endpoints (default) |
//! | `ollama` | Ollama local inference (default) |
//! | `serper` | Google results via Serper (default) |
//! | `duckduckgo` | Keyless DuckDuckGo search (default) |
//!
//! ## Modules
//!
//! - [`agents`] - The three pipeline roles
//! - [`research`] - Orchestrator, run context and retry budget
//! - [`schema`] - Output validation for each role
//! - [`llm`] - LLM service adapters
//! - [`search`] - Search service adapters, URL merging and clustering
//! - [`types`] - Domain types and error taxonomy
//! - [`utils`] - TOML configuration
//! - [`cli`] - Command-line parsing and report writers

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Pipeline roles and the role trait.
pub mod agents;
/// Command-line interface and report writers.
pub mod cli;
/// LLM service clients.
pub mod llm;
/// Orchestration, run state and retry.
pub mod research;
/// Role output validation.
pub mod schema;
/// Web search clients and result merging.
pub mod search;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

pub use agents::{AgentRole, InsightsCompiler, KeywordSpecialist, RoleEnv, SearchAnalyst};
pub use llm::{CompletionRequest, LlmClient, LlmProvider};
pub use research::{Orchestrator, OrchestratorSettings, RetryPolicy, DEFAULT_DEADLINE};
pub use schema::SchemaValidator;
pub use search::{SearchClient, SearchProvider};
pub use types::{
    AppError, Depth, FailureKind, PipelineError, Report, Result, RoleName, ServiceError, Topic,
};
pub use utils::{ConfigError, OutputFormat, QuarryConfig};
