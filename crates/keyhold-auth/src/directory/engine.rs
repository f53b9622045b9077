//! Directory preview engine

use super::classify::Phase;
use super::session::DirectorySession;
use super::DirectoryPreviewer;
use async_trait::async_trait;
use keyhold_core::config::DirectoryPreviewConfig;
use keyhold_core::types::{DirectoryConfig, DirectoryGroup, DirectoryUser, PreviewResult};
use keyhold_core::Result;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs candidate configurations against live directory servers.
///
/// Holds no per-call state: every preview opens, uses and releases its own
/// connection, and nothing from the candidate outlives the call.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPreviewEngine {
    settings: DirectoryPreviewConfig,
}

impl DirectoryPreviewEngine {
    pub fn new(settings: DirectoryPreviewConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DirectoryPreviewConfig {
        &self.settings
    }

    /// Validate, connect, bind and search with `candidate`
    pub async fn preview(&self, candidate: &DirectoryConfig) -> Result<PreviewResult> {
        if let Err(e) = candidate.validate() {
            debug!(error = %e, "Directory candidate rejected before connecting");
            return Err(e);
        }

        let started = Instant::now();
        let url = candidate.url();

        debug!(url = %url, "Starting directory preview");

        let mut session = DirectorySession::open(candidate, &self.settings).await?;

        match self.run(&mut session, candidate, started).await {
            Ok(result) => {
                session.close(self.settings.bind_timeout()).await;
                info!(
                    url = %url,
                    users = result.user_count,
                    groups = result.group_count,
                    truncated = result.truncated,
                    elapsed_ms = result.elapsed_ms,
                    "Directory preview succeeded"
                );
                Ok(result)
            }
            Err(e) => {
                drop(session);
                warn!(url = %url, code = e.code(), error = %e, "Directory preview failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        session: &mut DirectorySession,
        candidate: &DirectoryConfig,
        started: Instant,
    ) -> Result<PreviewResult> {
        session
            .bind(
                candidate.bind_dn.trim(),
                candidate.bind_password.expose(),
                self.settings.bind_timeout(),
            )
            .await?;

        let base = candidate.base_dn.trim();

        let users = session
            .search(
                Phase::UserSearch,
                base,
                &candidate.user_filter,
                candidate.user_attributes(),
                self.settings.max_entries,
                self.settings.search_timeout(),
            )
            .await?;

        let groups = if candidate.has_group_filter() {
            Some(
                session
                    .search(
                        Phase::GroupSearch,
                        base,
                        &candidate.group_filter,
                        candidate.group_attributes(),
                        self.settings.max_entries,
                        self.settings.search_timeout(),
                    )
                    .await?,
            )
        } else {
            None
        };

        let sample = self.settings.sample_size;

        let sample_users = users
            .entries
            .iter()
            .take(sample)
            .map(|(dn, attrs)| DirectoryUser::from_entry(candidate, dn, attrs))
            .collect();

        let (group_count, sample_groups, groups_truncated) = match &groups {
            Some(groups) => (
                groups.entries.len(),
                groups
                    .entries
                    .iter()
                    .take(sample)
                    .map(|(dn, attrs)| DirectoryGroup::from_entry(candidate, dn, attrs))
                    .collect(),
                groups.truncated,
            ),
            None => (0, Vec::new(), false),
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(PreviewResult::new(
            users.entries.len(),
            group_count,
            sample_users,
            sample_groups,
            users.truncated || groups_truncated,
            elapsed_ms,
        ))
    }
}

#[async_trait]
impl DirectoryPreviewer for DirectoryPreviewEngine {
    async fn preview(&self, candidate: &DirectoryConfig) -> Result<PreviewResult> {
        DirectoryPreviewEngine::preview(self, candidate).await
    }
}
