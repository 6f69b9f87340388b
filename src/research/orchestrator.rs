//! Pipeline orchestrator
//!
//! Runs the three roles in fixed order against one run deadline, retrying
//! each role under a shared [`RetryPolicy`] and validating every output
//! before the next role can see it.

use super::context::{AgentTask, RunContext};
use super::retry::{Budget, Deadline, RetryPolicy};
use crate::agents::{AgentRole, InsightsCompiler, KeywordSpecialist, RoleEnv, SearchAnalyst};
use crate::llm::LlmClient;
use crate::schema::SchemaValidator;
use crate::search::SearchClient;
use crate::types::{FailureKind, PipelineError, Report, RoleName, ServiceError, TaskRecord, Topic};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Tunables for one orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    /// Search queries in flight at once
    pub worker_count: usize,
    /// Keywords searched by the search analyst
    pub top_k: usize,
    pub results_per_query: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            worker_count: 4,
            top_k: 5,
            results_per_query: crate::agents::search_analyst::DEFAULT_RESULTS_PER_QUERY,
        }
    }
}

/// Default wall-clock budget for a run
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

/// Drives the keyword specialist, search analyst and insights compiler.
///
/// An orchestrator holds no per-run state; concurrent runs share nothing
/// but the service clients.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    settings: OrchestratorSettings,
    validator: SchemaValidator,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
            validator: SchemaValidator::new(),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Research `topic`, finishing within `deadline` or not at all.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the first role that failed
    /// irrecoverably, with its attempt count and root cause. No partial
    /// report is produced.
    pub async fn run(&self, topic: Topic, deadline: Duration) -> Result<Report, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id, topic = %topic.subject());

        async move {
            let budget = Budget::new(self.settings.retry, Deadline::after(deadline));
            let mut ctx = RunContext::new(topic);
            let mut tasks: Vec<TaskRecord> = Vec::with_capacity(RoleName::PIPELINE.len());

            info!(deadline_secs = deadline.as_secs_f64(), "research run started");

            let keyword_role = KeywordSpecialist::new(Arc::clone(&self.llm));
            let input = ctx.keyword_input();
            let (keywords, record) = self.execute(&keyword_role, &input, budget).await?;
            tasks.push(record);
            info!(keywords = keywords.entries.len(), "keyword analysis stored");
            ctx.store_keywords(keywords);

            let search_role = SearchAnalyst::new(Arc::clone(&self.llm), Arc::clone(&self.search))
                .with_worker_count(self.settings.worker_count)
                .with_top_k(self.settings.top_k)
                .with_results_per_query(self.settings.results_per_query);
            let input = ctx
                .search_input()
                .map_err(|e| self.abort(RoleName::SearchAnalyst, 0, e.into()))?;
            let (analysis, record) = self.execute(&search_role, &input, budget).await?;
            tasks.push(record);
            let mut warnings = Vec::new();
            if let Some(ref warning) = analysis.partial_coverage {
                warn!(%warning, "search analysis completed with partial coverage");
                warnings.push(warning.clone());
            }
            info!(
                items = analysis.items.len(),
                clusters = analysis.clusters.len(),
                "search analysis stored"
            );
            ctx.store_analysis(analysis);

            let insights_role = InsightsCompiler::new(Arc::clone(&self.llm));
            let input = ctx
                .insights_input()
                .map_err(|e| self.abort(RoleName::InsightsCompiler, 0, e.into()))?;
            let (recommendations, record) = self.execute(&insights_role, &input, budget).await?;
            tasks.push(record);
            ctx.store_recommendations(recommendations);

            let report = ctx
                .into_report(tasks, warnings)
                .map_err(|e| self.abort(RoleName::InsightsCompiler, 0, e.into()))?;
            info!("research run completed");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Run one role to a terminal state.
    ///
    /// Validation failures and transient service failures are retried with
    /// exponential backoff until `max_attempts` or the deadline; `Auth` is
    /// never retried. A rejected draft's diagnostic is passed to the next
    /// attempt as feedback.
    async fn execute<R: AgentRole>(
        &self,
        role: &R,
        input: &R::Input,
        budget: Budget,
    ) -> Result<(R::Output, TaskRecord), PipelineError> {
        let mut task = AgentTask::new(R::ROLE);
        let mut feedback: Option<String> = None;

        loop {
            if budget.deadline.is_expired() {
                let cause = ServiceError::timeout(format!(
                    "run deadline exhausted before attempt {} of {}",
                    task.attempts() + 1,
                    R::ROLE
                ));
                return Err(self.fail(&mut task, cause));
            }

            let attempt = task
                .start_attempt()
                .map_err(|e| self.abort(R::ROLE, task.attempts(), e.into()))?;
            let role_name = R::ROLE;
            let span = info_span!("role", role = %role_name, attempt);

            let outcome = async {
                info!("role attempt started");
                let env = RoleEnv {
                    budget,
                    attempt,
                    feedback: feedback.as_deref(),
                };
                match role.attempt(input, &env).await {
                    Ok(draft) => role.validate(&self.validator, input, draft).map_err(|failure| {
                        warn!(diagnostic = %failure.diagnostic, "output rejected by validator");
                        ServiceError::from(failure)
                    }),
                    Err(error) => Err(error),
                }
            }
            .instrument(span.clone())
            .await;

            let error = match outcome {
                Ok(output) => {
                    task.succeed()
                        .map_err(|e| self.abort(R::ROLE, task.attempts(), e.into()))?;
                    span.in_scope(|| info!("role succeeded"));
                    return Ok((output, task.record()));
                }
                Err(error) => error,
            };

            if error.kind.is_fatal() || attempt >= budget.policy.max_attempts {
                return Err(self.fail(&mut task, error));
            }

            if error.kind == FailureKind::Malformed {
                feedback = Some(error.message.clone());
            }

            let delay = budget.policy.backoff(attempt);
            span.in_scope(|| {
                warn!(
                    kind = %error.kind,
                    error = %error.message,
                    delay_ms = delay.as_millis() as u64,
                    "role attempt failed, retrying"
                )
            });
            task.retry(error)
                .map_err(|e| self.abort(R::ROLE, task.attempts(), e.into()))?;
            budget.deadline.backoff(delay).await;
        }
    }

    /// Mark `task` failed and build the run's terminal error
    fn fail(&self, task: &mut AgentTask, cause: ServiceError) -> PipelineError {
        if let Err(e) = task.fail(cause.clone()) {
            error!(error = %e, "task state out of sync");
        }
        self.abort(task.role(), task.attempts(), cause)
    }

    fn abort(&self, role: RoleName, attempts: u32, cause: ServiceError) -> PipelineError {
        error!(
            role = %role,
            attempts,
            kind = %cause.kind,
            error = %cause.message,
            "research run aborted"
        );
        PipelineError {
            role,
            attempts,
            cause,
        }
    }
}
