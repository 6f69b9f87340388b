//! Pipeline orchestration
//!
//! - [`orchestrator`] - [`Orchestrator::run`] sequences the three roles
//! - [`context`] - per-run outputs, typed role inputs and the task state machine
//! - [`retry`] - retry policy, run deadline and the budget roles borrow
//!
//! # Usage
//!
//! ```ignore
//! use quarry::research::{Orchestrator, OrchestratorSettings, DEFAULT_DEADLINE};
//! use quarry::types::Topic;
//!
//! let orchestrator = Orchestrator::new(llm, search, OrchestratorSettings::default());
//! let topic = Topic::new("Latest developments in AI agents")?;
//!
//! let report = orchestrator.run(topic, DEFAULT_DEADLINE).await?;
//! for entry in &report.recommendations.strategy {
//!     println!("{}. {}", entry.priority, entry.keyword);
//! }
//! ```
//!
//! # Run lifecycle
//!
//! 1. **Keywords** - the keyword specialist scores search terms for the topic
//! 2. **Search** - the search analyst queries the top keywords concurrently
//! 3. **Insights** - the insights compiler writes the recommendations
//!
//! Each output is validated before the next role sees it. Any role that
//! fails irrecoverably aborts the run.

/// Run context, role inputs and task lifecycle.
pub mod context;
/// Role sequencing, retries and the run deadline.
pub mod orchestrator;
/// Backoff policy and deadline accounting.
pub mod retry;

pub use context::{AgentTask, RunContext};
pub use orchestrator::{Orchestrator, OrchestratorSettings, DEFAULT_DEADLINE};
pub use retry::{Budget, Deadline, RetryPolicy};
