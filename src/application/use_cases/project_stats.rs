use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::application::use_cases::scope;
use crate::application::{GitMetaService, VectorStore};
use crate::domain::{DomainError, Project};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageBreakdown {
    pub files: u64,
    pub chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHub {
    pub name: String,
    pub count: u64,
}

/// A complex symbol with no test coverage in sight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighRiskSymbol {
    pub symbol_name: String,
    pub filename: String,
    pub start_line: u32,
    pub complexity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total_chunks: u64,
    pub total_files: u64,
    pub languages: HashMap<String, LanguageBreakdown>,
    pub dependency_hubs: Vec<DependencyHub>,
    pub high_risk: Vec<HighRiskSymbol>,
    pub active_branch: Option<String>,
    pub stale_files: u64,
}

/// Project statistics: store aggregates layered with git branch state,
/// sibling-test detection, and stale-file counting.
pub struct ProjectStatsUseCase {
    vector_store: Arc<dyn VectorStore>,
    git_meta: Arc<dyn GitMetaService>,
    complexity_threshold: u32,
    stale_days: i64,
}

impl ProjectStatsUseCase {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        git_meta: Arc<dyn GitMetaService>,
        complexity_threshold: u32,
        stale_days: i64,
    ) -> Self {
        Self {
            vector_store,
            git_meta,
            complexity_threshold,
            stale_days,
        }
    }

    pub async fn execute(&self, root: &str) -> Result<ProjectStats, DomainError> {
        let project = Project::open(root)?;
        let raw = self
            .vector_store
            .stats(project.id(), self.complexity_threshold)
            .await?;

        let high_risk = raw
            .high_complexity
            .iter()
            .filter(|c| !scope::has_sibling_test(c.filename(), &raw.filenames))
            .map(|c| HighRiskSymbol {
                symbol_name: c.symbol_name().to_string(),
                filename: c.filename().to_string(),
                start_line: c.start_line(),
                complexity: c.complexity(),
            })
            .collect();

        let cutoff = Utc::now() - Duration::days(self.stale_days);
        let stale_files = raw
            .last_modified
            .values()
            .filter(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|dt| dt.with_timezone(&Utc) < cutoff)
                    .unwrap_or(false)
            })
            .count() as u64;

        let active_branch = self.git_meta.active_branch(project.root()).await;

        Ok(ProjectStats {
            total_chunks: raw.total_chunks,
            total_files: raw.total_files,
            languages: raw
                .languages
                .into_iter()
                .map(|(lang, (files, chunks))| (lang, LanguageBreakdown { files, chunks }))
                .collect(),
            dependency_hubs: raw
                .dependency_hubs
                .into_iter()
                .map(|(name, count)| DependencyHub { name, count })
                .collect(),
            high_risk,
            active_branch,
            stale_files,
        })
    }
}
