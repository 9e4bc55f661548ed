use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::query;
use crate::server::StoryServer;
use crate::types::{Category, PlatformStats, UserActivity};

use super::parse_role;

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: PlatformStats,
    pub trending: Vec<TrendingCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingCategory {
    pub category: Category,
    pub label: &'static str,
    pub stories: usize,
}

impl StoryServer {
    pub async fn do_platform_stats(&self, trending: usize) -> Result<StatsReport> {
        let stats = self.store.lock().await.platform_stats(Utc::now())?;
        let trending = query::trending_categories(&stats, trending)
            .into_iter()
            .map(|(category, stories)| TrendingCategory {
                category,
                label: category.label(),
                stories,
            })
            .collect();
        Ok(StatsReport { stats, trending })
    }

    pub async fn do_user_activity(&self, user_id: &str, role: &str) -> Result<UserActivity> {
        let role = parse_role(role)?;
        self.store.lock().await.user_activity(user_id, role)
    }

    pub async fn do_export_data(&self) -> Result<serde_json::Value> {
        self.store.lock().await.export_data(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::stories::Submission;
    use crate::tools::testing;
    use tempfile::TempDir;

    async fn share(server: &StoryServer, title: &str, category: Category, words: usize) {
        server
            .do_share_story(Submission {
                title: title.into(),
                category: Some(category),
                transcript: Some(vec!["word"; words].join(" ")),
                contributor_id: "elder-1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stats_reflect_shared_stories() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);
        share(&server, "A", Category::Cooking, 3600).await;
        share(&server, "B", Category::Cooking, 3600).await;
        share(&server, "C", Category::Travel, 7200).await;

        let report = server.do_platform_stats(1).await.unwrap();
        assert_eq!(report.stats.total_stories, 3);
        assert_eq!(report.stats.categories_covered, 2);
        assert!((report.stats.total_listening_time_hours - 2.0).abs() < 1e-9);
        assert_eq!(report.stats.recent_activity_count, 3);
        assert_eq!(report.trending.len(), 1);
        assert_eq!(report.trending[0].category, Category::Cooking);
        assert_eq!(report.trending[0].stories, 2);

        let activity = server.do_user_activity("elder-1", "elder").await.unwrap();
        assert_eq!(activity.stories_contributed, 3);
        assert!(server.do_user_activity("elder-1", "teacher").await.is_err());
    }

    #[tokio::test]
    async fn export_includes_every_collection() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);
        share(&server, "A", Category::Health, 10).await;

        let export = server.do_export_data().await.unwrap();
        assert_eq!(export["stories"].as_array().unwrap().len(), 1);
        assert!(export["profiles"].as_array().unwrap().is_empty());
        assert!(export["connections"].is_array());
        assert!(export["questions"].is_array());
        assert_eq!(export["stats"]["total_stories"], 1);
        assert!(export["export_date"].is_string());
    }
}
