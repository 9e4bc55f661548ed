use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::types::{
    Category, Connection, ConnectionStatus, Engagement, Interaction, InteractionKind,
    PlatformStats, Question, QuestionFilter, QuestionStatus, Role, SortOrder, Story, StoryFilter,
    UserActivity,
};

pub const RECENT_WINDOW_DAYS: i64 = 7;

pub fn matches_filter(story: &Story, filter: &StoryFilter) -> bool {
    if let Some(category) = filter.category {
        if story.category != category {
            return false;
        }
    }
    if let Some(ref contributor) = filter.contributor {
        if &story.contributor_id != contributor && &story.contributor_name != contributor {
            return false;
        }
    }
    true
}

/// Newest first. Equal timestamps fall back to id so the order is repeatable.
pub fn sort_newest_first(stories: &mut [Story]) {
    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

pub fn filter_stories(stories: Vec<Story>, filter: &StoryFilter) -> Vec<Story> {
    let mut kept: Vec<Story> = stories
        .into_iter()
        .filter(|s| matches_filter(s, filter))
        .collect();
    sort_newest_first(&mut kept);
    kept
}

/// Case-insensitive substring match over title, transcript, summary and tags.
/// Input order is preserved.
pub fn search(stories: Vec<Story>, query: &str) -> Vec<Story> {
    let needle = query.to_lowercase();
    stories
        .into_iter()
        .filter(|s| s.searchable_text().contains(&needle))
        .collect()
}

/// Reorder newest-first results for the requested order.
pub fn apply_order(stories: &mut Vec<Story>, query: &str, order: SortOrder) {
    match order {
        SortOrder::Newest => sort_newest_first(stories),
        SortOrder::Oldest => {
            sort_newest_first(stories);
            stories.reverse();
        }
        SortOrder::Alphabetical => {
            stories.sort_by_key(|s| s.title.to_lowercase());
        }
        SortOrder::Relevance => {
            sort_newest_first(stories);
            let ranked = rank_by_relevance(query, std::mem::take(stories));
            *stories = ranked;
        }
    }
}

fn query_words(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

/// Number of distinct query words that occur in title + transcript + summary.
pub fn relevance_score(words: &[String], story: &Story) -> usize {
    let text = format!("{} {} {}", story.title, story.transcript, story.summary).to_lowercase();
    words.iter().filter(|w| text.contains(w.as_str())).count()
}

/// Stable sort by descending word overlap; ties keep their incoming order.
pub fn rank_by_relevance(query: &str, stories: Vec<Story>) -> Vec<Story> {
    let words = query_words(query);
    let mut scored: Vec<(usize, Story)> = stories
        .into_iter()
        .map(|s| (relevance_score(&words, &s), s))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, s)| s).collect()
}

pub fn filter_questions(questions: Vec<Question>, filter: &QuestionFilter) -> Vec<Question> {
    let mut kept: Vec<Question> = questions
        .into_iter()
        .filter(|q| filter.elder_id.is_none() || q.elder_id == filter.elder_id)
        .filter(|q| filter.category.map_or(true, |c| q.category == c))
        .filter(|q| filter.seeker_id.as_ref().map_or(true, |s| &q.seeker_id == s))
        .filter(|q| filter.status.map_or(true, |st| q.status == st))
        .collect();
    kept.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    kept
}

pub fn connections_for(connections: Vec<Connection>, user_id: &str, role: Role) -> Vec<Connection> {
    let mut kept: Vec<Connection> = connections
        .into_iter()
        .filter(|c| match role {
            Role::Elder => c.elder_id == user_id,
            Role::Seeker => c.seeker_id == user_id,
        })
        .collect();
    kept.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    kept
}

/// Recomputed from scratch on every call.
pub fn platform_stats(
    stories: &[Story],
    profile_count: usize,
    connections: &[Connection],
    questions: &[Question],
    now: DateTime<Utc>,
) -> PlatformStats {
    let mut by_category: BTreeMap<Category, usize> = BTreeMap::new();
    let mut total_seconds = 0.0;
    for story in stories {
        *by_category.entry(story.category).or_default() += 1;
        total_seconds += story.duration;
    }

    let window_start = now - Duration::days(RECENT_WINDOW_DAYS);

    PlatformStats {
        total_stories: stories.len(),
        active_contributors: profile_count,
        connections_made: connections
            .iter()
            .filter(|c| c.status == ConnectionStatus::Accepted)
            .count(),
        questions_answered: questions
            .iter()
            .filter(|q| q.status == QuestionStatus::Answered)
            .count(),
        categories_covered: by_category.len(),
        total_listening_time_hours: total_seconds / 3600.0,
        stories_by_category: by_category,
        recent_activity_count: stories.iter().filter(|s| s.created_at > window_start).count(),
    }
}

/// Categories by story count, most popular first; ties go to the lower category key.
pub fn trending_categories(stats: &PlatformStats, limit: usize) -> Vec<(Category, usize)> {
    let mut ranked: Vec<(Category, usize)> =
        stats.stories_by_category.iter().map(|(c, n)| (*c, *n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    ranked.truncate(limit);
    ranked
}

pub fn user_activity(
    user_id: &str,
    role: Role,
    stories: &[Story],
    connections: &[Connection],
    questions: &[Question],
    interactions: &[Interaction],
) -> UserActivity {
    let accepted = |c: &&Connection| c.status == ConnectionStatus::Accepted;
    let mut activity = UserActivity::default();

    match role {
        Role::Elder => {
            let contributor = StoryFilter {
                category: None,
                contributor: Some(user_id.to_string()),
            };
            activity.stories_contributed =
                stories.iter().filter(|s| matches_filter(s, &contributor)).count();
            activity.connections_made = connections
                .iter()
                .filter(|c| c.elder_id == user_id)
                .filter(accepted)
                .count();
            activity.questions_answered = questions
                .iter()
                .filter(|q| q.elder_id.as_deref() == Some(user_id))
                .filter(|q| q.status == QuestionStatus::Answered)
                .count();
        }
        Role::Seeker => {
            activity.connections_made = connections
                .iter()
                .filter(|c| c.seeker_id == user_id)
                .filter(accepted)
                .count();
            activity.questions_asked = questions.iter().filter(|q| q.seeker_id == user_id).count();
            activity.stories_listened = interactions
                .iter()
                .filter(|i| i.user_id == user_id && i.kind == InteractionKind::View)
                .map(|i| i.story_id.as_str())
                .collect::<HashSet<_>>()
                .len();
        }
    }
    activity
}

pub fn engagement(story_id: &str, interactions: &[Interaction]) -> Engagement {
    let mut counts = Engagement::default();
    for i in interactions.iter().filter(|i| i.story_id == story_id) {
        match i.kind {
            InteractionKind::View => counts.views += 1,
            InteractionKind::Like => counts.likes += 1,
            InteractionKind::Save => counts.saves += 1,
            InteractionKind::Comment => counts.comments += 1,
        }
    }
    counts
}
