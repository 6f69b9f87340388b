//! Report persistence
//!
//! A finished [`Report`] is written as three files, one per pipeline stage:
//! `keyword_analysis_<ts>`, `search_analysis_<ts>` and
//! `final_recommendations_<ts>`, as Markdown or JSON.
//!
//! Citations (the recommendation evidence) are written unless the writer
//! is built with `with_citations(false)`.

use crate::types::{Report, Result};
use crate::utils::OutputFormat;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths of the three files written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub keyword_analysis: PathBuf,
    pub search_analysis: PathBuf,
    pub recommendations: PathBuf,
}

impl ReportFiles {
    pub fn paths(&self) -> [&Path; 3] {
        [
            &self.keyword_analysis,
            &self.search_analysis,
            &self.recommendations,
        ]
    }
}

pub struct ReportWriter {
    dir: PathBuf,
    format: OutputFormat,
    citations: bool,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            citations: true,
        }
    }

    pub fn with_citations(mut self, citations: bool) -> Self {
        self.citations = citations;
        self
    }

    /// Local time stamp used in file names, e.g. `20250114_093000`
    pub fn timestamp() -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }

    /// Write the three report files, creating the output directory if needed
    pub fn write(&self, report: &Report, timestamp: &str) -> Result<ReportFiles> {
        fs::create_dir_all(&self.dir)?;

        let ext = match self.format {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        };
        let path = |stem: &str| self.dir.join(format!("{}_{}.{}", stem, timestamp, ext));

        let files = ReportFiles {
            keyword_analysis: path("keyword_analysis"),
            search_analysis: path("search_analysis"),
            recommendations: path("final_recommendations"),
        };

        let mut recs = serde_json::to_value(&report.recommendations)?;
        if !self.citations {
            if let Some(fields) = recs.as_object_mut() {
                fields.remove("evidence");
            }
        }

        let (keywords, search, recommendations) = match self.format {
            OutputFormat::Markdown => (
                render_keyword_analysis(report),
                render_search_analysis(report),
                render_recommendations(report, self.citations),
            ),
            OutputFormat::Json => (
                serde_json::to_string_pretty(&json!({
                    "topic": report.topic,
                    "keyword_analysis": report.keyword_analysis,
                }))?,
                serde_json::to_string_pretty(&json!({
                    "topic": report.topic,
                    "search_analysis": report.search_analysis,
                }))?,
                serde_json::to_string_pretty(&json!({
                    "topic": report.topic,
                    "recommendations": recs,
                    "tasks": report.tasks,
                    "warnings": report.warnings,
                }))?,
            ),
        };

        fs::write(&files.keyword_analysis, keywords)?;
        fs::write(&files.search_analysis, search)?;
        fs::write(&files.recommendations, recommendations)?;

        Ok(files)
    }
}

/// Make text safe for a single Markdown table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn topic_header(report: &Report, title: &str) -> String {
    let topic = &report.topic;
    let mut out = format!("# {}: {}\n\n", title, topic.subject());

    if let Some(objective) = topic.research_objective() {
        out.push_str(&format!("**Research objective:** {}\n\n", objective));
    }
    if let Some(focus) = topic.specific_focus() {
        out.push_str(&format!("**Specific focus:** {}\n\n", focus));
    }
    if let Some(context) = topic.context() {
        out.push_str(&format!("**Context:** {}\n\n", context));
    }
    out.push_str(&format!("**Depth:** {}\n\n", topic.depth()));
    out
}

pub fn render_keyword_analysis(report: &Report) -> String {
    let keywords = &report.keyword_analysis;
    let mut out = topic_header(report, "Keyword Analysis");

    if !keywords.concepts.is_empty() {
        out.push_str("## Core Concepts\n\n");
        for concept in &keywords.concepts {
            out.push_str(&format!("- {}\n", concept));
        }
        out.push('\n');
    }

    out.push_str("## Keywords\n\n");
    out.push_str("| ID | Keyword | Score | Intent | Concept | Rationale |\n");
    out.push_str("|----|---------|-------|--------|---------|-----------|\n");
    for entry in &keywords.entries {
        let intent = serde_json::to_value(entry.intent)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} | {} |\n",
            entry.id,
            cell(&entry.keyword),
            entry.score,
            intent,
            cell(entry.concept.as_deref().unwrap_or("")),
            cell(&entry.rationale)
        ));
    }

    if !keywords.related_terms.is_empty() {
        out.push_str("\n## Related Terms\n\n");
        for term in &keywords.related_terms {
            out.push_str(&format!("- {}\n", term));
        }
    }

    out
}

pub fn render_search_analysis(report: &Report) -> String {
    let analysis = &report.search_analysis;
    let mut out = topic_header(report, "Search Analysis");

    out.push_str("## Coverage\n\n");
    out.push_str(&format!(
        "{}/{} keyword queries returned results.\n",
        analysis.coverage.succeeded, analysis.coverage.attempted
    ));
    for failed in &analysis.coverage.failed {
        out.push_str(&format!(
            "\n> `{}` (\"{}\") failed: {} error: {}\n",
            failed.keyword_id, failed.query, failed.kind, failed.message
        ));
    }

    out.push_str("\n## Results by Relevance\n\n");
    for (rank, id) in analysis.ranking.iter().enumerate() {
        let Some(item) = analysis.item(id) else {
            continue;
        };
        out.push_str(&format!(
            "{}. [{}]({}) `{}` (keywords: {})\n",
            rank + 1,
            item.title,
            item.url,
            item.id,
            item.keyword_ids.join(", ")
        ));
        if !item.snippet.is_empty() {
            out.push_str(&format!("   {}\n", item.snippet));
        }
    }

    if !analysis.clusters.is_empty() {
        out.push_str("\n## Clusters\n");
        for cluster in &analysis.clusters {
            out.push_str(&format!(
                "\n### {} ({})\n\n{}\n\nSources: {}\n",
                cluster.label,
                cluster.id,
                cluster.summary,
                cluster.item_ids.join(", ")
            ));
        }
    }

    if !analysis.gaps.is_empty() {
        out.push_str("\n## Gaps\n\n");
        for gap in &analysis.gaps {
            out.push_str(&format!("- {}\n", gap));
        }
    }

    if !analysis.refinements.is_empty() {
        out.push_str("\n## Suggested Refinements\n\n");
        for refinement in &analysis.refinements {
            out.push_str(&format!(
                "- `{}`: \"{}\"",
                refinement.keyword_id, refinement.suggested_query
            ));
            if !refinement.reason.is_empty() {
                out.push_str(&format!(" ({})", refinement.reason));
            }
            out.push('\n');
        }
    }

    out
}

pub fn render_recommendations(report: &Report, citations: bool) -> String {
    let recs = &report.recommendations;
    let keyword = |id: &str| {
        report
            .keyword_analysis
            .get(id)
            .map(|e| e.keyword.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut out = topic_header(report, "Final Recommendations");

    out.push_str(&format!("## Summary\n\n{}\n", recs.summary));

    out.push_str("\n## Prioritized Keyword Strategy\n\n");
    for entry in &recs.strategy {
        out.push_str(&format!(
            "{}. **{}** (`{}`): {}\n",
            entry.priority, entry.keyword, entry.keyword_id, entry.recommendation
        ));
    }

    if !recs.groups.is_empty() {
        out.push_str("\n## Keyword Groups\n");
        for group in &recs.groups {
            out.push_str(&format!("\n### {}\n\n", group.name));
            for id in &group.keyword_ids {
                out.push_str(&format!("- {} (`{}`)\n", keyword(id), id));
            }
        }
    }

    if !recs.objectives.is_empty() {
        out.push_str("\n## Recommendations by Objective\n");
        for objective in &recs.objectives {
            out.push_str(&format!(
                "\n### {}\n\n{}\n",
                objective.objective, objective.recommendation
            ));
            if !objective.keyword_ids.is_empty() {
                let names: Vec<String> = objective.keyword_ids.iter().map(|id| keyword(id)).collect();
                out.push_str(&format!("\nKeywords: {}\n", names.join(", ")));
            }
        }
    }

    if citations {
        out.push_str("\n## Evidence\n\n");
        for evidence in &recs.evidence {
            let cited: Vec<&str> = evidence
                .keyword_ids
                .iter()
                .chain(evidence.source_ids.iter())
                .map(String::as_str)
                .collect();
            out.push_str(&format!("- {} [{}]\n", evidence.claim, cited.join(", ")));
        }
    }

    out
}
