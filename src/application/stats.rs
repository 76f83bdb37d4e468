//! Site-wide aggregates, computed fresh on every call.

use std::sync::Arc;

use crate::application::repos::{RepoError, StatsRepo};
use crate::domain::entities::{SiteStats, TagWithCount};

pub const POPULAR_TAG_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct StatsService {
    repo: Arc<dyn StatsRepo>,
}

impl StatsService {
    pub fn new(repo: Arc<dyn StatsRepo>) -> Self {
        Self { repo }
    }

    pub async fn stats(&self) -> Result<SiteStats, RepoError> {
        let total_posts = self.repo.count_published_posts().await?;
        let total_comments = self.repo.count_comments().await?;
        let popular_tags = self.repo.popular_tags(POPULAR_TAG_LIMIT).await?;
        Ok(SiteStats {
            total_posts,
            total_comments,
            popular_tags,
        })
    }

    pub async fn tag_cloud(&self) -> Result<Vec<TagWithCount>, RepoError> {
        self.repo.tag_cloud().await
    }
}
