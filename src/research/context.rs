//! Per-run shared state
//!
//! [`RunContext`] holds the topic and each role's validated output. Roles
//! never touch it directly: the orchestrator hands each role a typed input
//! slice built from the outputs of the roles before it.

use crate::types::{
    KeywordResult, PartialCoverageWarning, RecommendationReport, Report, RoleName,
    SearchAnalysisResult, ServiceError, TaskRecord, TaskStatus, Topic,
};
use std::sync::Arc;

/// Input of the keyword specialist
#[derive(Debug, Clone)]
pub struct KeywordInput {
    pub topic: Arc<Topic>,
}

/// Input of the search analyst
#[derive(Debug, Clone)]
pub struct SearchInput {
    pub topic: Arc<Topic>,
    pub keywords: Arc<KeywordResult>,
}

/// Input of the insights compiler
#[derive(Debug, Clone)]
pub struct InsightsInput {
    pub topic: Arc<Topic>,
    pub keywords: Arc<KeywordResult>,
    pub analysis: Arc<SearchAnalysisResult>,
}

/// A role asked for an upstream output that has not been produced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{needed_by} needs the output of {missing}, which has not completed")]
pub struct MissingOutput {
    pub needed_by: RoleName,
    pub missing: RoleName,
}

impl From<MissingOutput> for ServiceError {
    fn from(err: MissingOutput) -> Self {
        ServiceError::unknown(err.to_string())
    }
}

/// Validated outputs of one run, keyed by role
#[derive(Debug)]
pub struct RunContext {
    topic: Arc<Topic>,
    keywords: Option<Arc<KeywordResult>>,
    analysis: Option<Arc<SearchAnalysisResult>>,
    recommendations: Option<Arc<RecommendationReport>>,
}

impl RunContext {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic: Arc::new(topic),
            keywords: None,
            analysis: None,
            recommendations: None,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn keyword_input(&self) -> KeywordInput {
        KeywordInput {
            topic: Arc::clone(&self.topic),
        }
    }

    pub fn search_input(&self) -> Result<SearchInput, MissingOutput> {
        Ok(SearchInput {
            topic: Arc::clone(&self.topic),
            keywords: self.require_keywords(RoleName::SearchAnalyst)?,
        })
    }

    pub fn insights_input(&self) -> Result<InsightsInput, MissingOutput> {
        let needed_by = RoleName::InsightsCompiler;
        let analysis = self.analysis.clone().ok_or(MissingOutput {
            needed_by,
            missing: RoleName::SearchAnalyst,
        })?;

        Ok(InsightsInput {
            topic: Arc::clone(&self.topic),
            keywords: self.require_keywords(needed_by)?,
            analysis,
        })
    }

    fn require_keywords(&self, needed_by: RoleName) -> Result<Arc<KeywordResult>, MissingOutput> {
        self.keywords.clone().ok_or(MissingOutput {
            needed_by,
            missing: RoleName::KeywordSpecialist,
        })
    }

    pub fn store_keywords(&mut self, result: KeywordResult) {
        self.keywords = Some(Arc::new(result));
    }

    pub fn store_analysis(&mut self, result: SearchAnalysisResult) {
        self.analysis = Some(Arc::new(result));
    }

    pub fn store_recommendations(&mut self, report: RecommendationReport) {
        self.recommendations = Some(Arc::new(report));
    }

    /// Roles whose output has been stored, in pipeline order
    pub fn completed_roles(&self) -> Vec<RoleName> {
        RoleName::PIPELINE
            .into_iter()
            .filter(|role| match role {
                RoleName::KeywordSpecialist => self.keywords.is_some(),
                RoleName::SearchAnalyst => self.analysis.is_some(),
                RoleName::InsightsCompiler => self.recommendations.is_some(),
            })
            .collect()
    }

    /// Assemble the final report once every role has produced its output
    pub fn into_report(
        self,
        tasks: Vec<TaskRecord>,
        warnings: Vec<PartialCoverageWarning>,
    ) -> Result<Report, MissingOutput> {
        let needed_by = RoleName::InsightsCompiler;
        let missing = |missing| MissingOutput { needed_by, missing };

        let keywords = self.keywords.ok_or(missing(RoleName::KeywordSpecialist))?;
        let analysis = self.analysis.ok_or(missing(RoleName::SearchAnalyst))?;
        let recommendations = self
            .recommendations
            .ok_or(missing(RoleName::InsightsCompiler))?;

        Ok(Report {
            topic: Arc::unwrap_or_clone(self.topic),
            keyword_analysis: Arc::unwrap_or_clone(keywords),
            search_analysis: Arc::unwrap_or_clone(analysis),
            recommendations: Arc::unwrap_or_clone(recommendations),
            tasks,
            warnings,
        })
    }
}

/// Illegal task state change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition for {role} task: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub role: RoleName,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::unknown(err.to_string())
    }
}

/// One role's work item within a run.
///
/// ```text
/// Pending -> Running -> Succeeded
///               |  \--> Failed
///               v
///           Retrying -> Running
///               \-----> Failed
/// ```
///
/// `Pending -> Failed` covers a run whose deadline passes before the role
/// gets its first attempt.
#[derive(Debug, Clone)]
pub struct AgentTask {
    role: RoleName,
    status: TaskStatus,
    attempts: u32,
    last_failure: Option<ServiceError>,
}

impl AgentTask {
    pub fn new(role: RoleName) -> Self {
        Self {
            role,
            status: TaskStatus::Pending,
            attempts: 0,
            last_failure: None,
        }
    }

    pub fn role(&self) -> RoleName {
        self.role
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_failure(&self) -> Option<&ServiceError> {
        self.last_failure.as_ref()
    }

    /// Enter `Running` and count a new attempt; returns the attempt number
    pub fn start_attempt(&mut self) -> Result<u32, InvalidTransition> {
        self.transition(TaskStatus::Running)?;
        self.attempts += 1;
        Ok(self.attempts)
    }

    pub fn retry(&mut self, cause: ServiceError) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Retrying)?;
        self.last_failure = Some(cause);
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Succeeded)
    }

    pub fn fail(&mut self, cause: ServiceError) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Failed)?;
        self.last_failure = Some(cause);
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), InvalidTransition> {
        use TaskStatus::*;

        let allowed = matches!(
            (self.status, to),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Retrying)
                | (Retrying, Running)
                | (Retrying, Failed)
        );

        if !allowed {
            return Err(InvalidTransition {
                role: self.role,
                from: self.status,
                to,
            });
        }

        self.status = to;
        Ok(())
    }

    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            role: self.role,
            status: self.status,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coverage, FailureKind};

    fn keywords() -> KeywordResult {
        KeywordResult {
            concepts: vec!["agents".to_string()],
            entries: vec![],
            related_terms: vec![],
        }
    }

    fn analysis() -> SearchAnalysisResult {
        SearchAnalysisResult {
            items: vec![],
            clusters: vec![],
            ranking: vec![],
            coverage: Coverage::default(),
            gaps: vec![],
            refinements: vec![],
            partial_coverage: None,
        }
    }

    #[test]
    fn test_task_happy_path() {
        let mut task = AgentTask::new(RoleName::KeywordSpecialist);
        assert_eq!(task.status(), TaskStatus::Pending);

        assert_eq!(task.start_attempt().unwrap(), 1);
        task.retry(ServiceError::timeout("slow")).unwrap();
        assert_eq!(task.status(), TaskStatus::Retrying);
        assert_eq!(task.start_attempt().unwrap(), 2);
        task.succeed().unwrap();

        let record = task.record();
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(record.attempts, 2);
        assert_eq!(task.last_failure().unwrap().kind, FailureKind::Timeout);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut task = AgentTask::new(RoleName::SearchAnalyst);
        task.start_attempt().unwrap();
        task.fail(ServiceError::auth("denied")).unwrap();

        assert!(task.status().is_terminal());
        let err = task.start_attempt().unwrap_err();
        assert_eq!(err.from, TaskStatus::Failed);
        assert_eq!(err.to, TaskStatus::Running);
        assert_eq!(task.attempts(), 1);
    }

    #[test]
    fn test_cannot_succeed_without_running() {
        let mut task = AgentTask::new(RoleName::InsightsCompiler);
        assert!(task.succeed().is_err());
        assert!(task.retry(ServiceError::unknown("x")).is_err());
    }

    #[test]
    fn test_inputs_require_upstream_outputs() {
        let mut ctx = RunContext::new(Topic::new("rust").unwrap());
        let err = ctx.search_input().unwrap_err();
        assert_eq!(err.missing, RoleName::KeywordSpecialist);

        ctx.store_keywords(keywords());
        assert!(ctx.search_input().is_ok());
        let err = ctx.insights_input().unwrap_err();
        assert_eq!(err.missing, RoleName::SearchAnalyst);

        ctx.store_analysis(analysis());
        let input = ctx.insights_input().unwrap();
        assert_eq!(input.topic.subject(), "rust");
        assert_eq!(
            ctx.completed_roles(),
            vec![RoleName::KeywordSpecialist, RoleName::SearchAnalyst]
        );
    }

    #[test]
    fn test_into_report_requires_every_output() {
        let mut ctx = RunContext::new(Topic::new("rust").unwrap());
        ctx.store_keywords(keywords());
        ctx.store_analysis(analysis());
        let err = ctx.into_report(vec![], vec![]).unwrap_err();
        assert_eq!(err.missing, RoleName::InsightsCompiler);
    }
}
