use anyhow::Result;
use serde::Serialize;

use crate::server::{SaveProfileRequest, StoryServer};
use crate::types::{PrivacyLevel, Role, UserProfile};

use super::{invalid, non_blank, parse_role};

#[derive(Debug, Clone, Serialize)]
pub struct MentorMatch {
    pub profile: UserProfile,
    pub score: f64,
}

impl StoryServer {
    pub async fn do_save_profile(&self, req: SaveProfileRequest) -> Result<UserProfile> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(invalid("Please enter your name to continue"));
        }
        let role = parse_role(&req.role)?;
        let privacy_level = match non_blank(req.privacy_level.as_deref()) {
            None => PrivacyLevel::default(),
            Some(p) => PrivacyLevel::from_str(p).ok_or_else(|| {
                invalid(format!("Unknown privacy level '{}'. use: public, community, connections", p))
            })?,
        };

        let mut profile = UserProfile::new(name, role);
        profile.id = non_blank(req.id.as_deref()).unwrap_or_default().to_string();
        profile.age = req.age;
        profile.location = non_blank(req.location.as_deref()).map(str::to_string);
        profile.bio = req.bio.unwrap_or_default();
        profile.expertise_areas = req.expertise_areas;
        profile.interests = req.interests;
        profile.goals = non_blank(req.goals.as_deref()).map(str::to_string);
        profile.privacy_level = privacy_level;

        let store = self.store.lock().await;
        let id = store.save_profile(profile)?;
        store
            .get_profile(&id)?
            .ok_or_else(|| anyhow::anyhow!("profile {} vanished after save", id))
    }

    pub async fn do_get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        self.store.lock().await.get_profile(id)
    }

    pub async fn do_list_profiles(&self, role: Option<&str>) -> Result<Vec<UserProfile>> {
        let role = non_blank(role).map(parse_role).transpose()?;
        self.store.lock().await.list_profiles(role)
    }

    /// Elders ordered by fit with the seeker. None when the seeker is unknown.
    pub async fn do_suggest_mentors(&self, seeker_id: &str, limit: usize) -> Result<Option<Vec<MentorMatch>>> {
        let (seeker, elders) = {
            let store = self.store.lock().await;
            let Some(seeker) = store.get_profile(seeker_id)? else {
                return Ok(None);
            };
            (seeker, store.list_profiles(Some(Role::Elder))?)
        };

        let goals = seeker.goals.as_deref().unwrap_or_default();
        let mut matches = Vec::with_capacity(elders.len());
        for elder in elders {
            if elder.privacy_level == PrivacyLevel::Connections {
                continue;
            }
            let score = self
                .enricher
                .match_score(&seeker.interests, &elder.expertise_areas, goals)
                .await;
            matches.push(MentorMatch { profile: elder, score });
        }

        // list_profiles is name-ordered, so equal scores stay alphabetical
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Ok(Some(matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use tempfile::TempDir;

    fn request(name: &str, role: &str) -> SaveProfileRequest {
        SaveProfileRequest {
            id: None,
            name: name.into(),
            role: role.into(),
            age: None,
            location: None,
            bio: None,
            expertise_areas: Vec::new(),
            interests: Vec::new(),
            goals: None,
            privacy_level: None,
        }
    }

    fn elder(name: &str, expertise: &[&str]) -> SaveProfileRequest {
        let mut req = request(name, "elder");
        req.expertise_areas = expertise.iter().map(|s| s.to_string()).collect();
        req
    }

    #[tokio::test]
    async fn resubmitting_with_id_updates() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);

        let first = server.do_save_profile(request("Margaret", "Elder")).await.unwrap();
        assert_eq!(first.role, Role::Elder);
        assert_eq!(first.privacy_level, PrivacyLevel::Community);

        let mut again = request("Margaret B.", "elder");
        again.id = Some(first.id.clone());
        let second = server.do_save_profile(again).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Margaret B.");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(server.do_list_profiles(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_blank_name_and_unknown_role() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);
        assert!(server.do_save_profile(request(" ", "elder")).await.is_err());
        let err = server.do_save_profile(request("Sam", "mentor")).await.unwrap_err();
        assert!(err.to_string().contains("Unknown role 'mentor'"));
        assert!(server.do_list_profiles(Some("wizard")).await.is_err());
    }

    #[tokio::test]
    async fn mentors_ranked_by_overlap() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);

        server.do_save_profile(elder("Bea", &["cooking", "travel"])).await.unwrap();
        server.do_save_profile(elder("Al", &["finance"])).await.unwrap();
        server.do_save_profile(elder("Cy", &["Cooking"])).await.unwrap();
        let mut hidden = elder("Di", &["cooking"]);
        hidden.privacy_level = Some("connections".into());
        server.do_save_profile(hidden).await.unwrap();

        let mut seeker = request("Sam", "seeker");
        seeker.interests = vec!["cooking".into()];
        let seeker = server.do_save_profile(seeker).await.unwrap();

        let matches = server.do_suggest_mentors(&seeker.id, 5).await.unwrap().unwrap();
        let names: Vec<_> = matches.iter().map(|m| m.profile.name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Bea", "Al"]);
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[2].score, 0.0);

        assert_eq!(server.do_suggest_mentors(&seeker.id, 1).await.unwrap().unwrap().len(), 1);
        assert!(server.do_suggest_mentors("nobody", 5).await.unwrap().is_none());
    }
}
