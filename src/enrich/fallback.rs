//! Keyword heuristics used whenever the text model is unavailable or fails.

use std::collections::HashSet;

use crate::types::{Category, EmotionalTone, TagSet};

pub const SECONDS_PER_WORD: f64 = 0.5;

const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    ("family", &["family", "parent", "child", "marriage", "spouse"]),
    ("work", &["job", "career", "business", "work", "money"]),
    ("cooking", &["cook", "recipe", "food", "kitchen", "meal"]),
    ("wisdom", &["learn", "advice", "lesson", "experience"]),
    ("historical", &["war", "depression", "past", "history"]),
    ("challenges", &["difficult", "hard", "struggle", "overcome"]),
    ("relationships", &["friend", "love", "relationship", "people"]),
    ("skills", &["skill", "learn", "teach", "know", "craft"]),
];

/// Scanned in this order; the first category with the top score wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Cooking, &["recipe", "cook", "food", "kitchen", "meal", "ingredient"]),
    (Category::Professional, &["work", "job", "career", "business", "office", "boss"]),
    (Category::Parenting, &["child", "parent", "kid", "family", "raise", "discipline"]),
    (Category::Relationships, &["marriage", "love", "friend", "relationship", "spouse"]),
    (Category::Health, &["health", "doctor", "medicine", "illness", "hospital"]),
    (Category::Travel, &["travel", "trip", "journey", "place", "country", "visit"]),
    (Category::Historical, &["war", "depression", "past", "history", "old days"]),
    (Category::Cultural, &["tradition", "culture", "heritage", "custom", "celebration"]),
    (Category::Crafts, &["craft", "hobby", "make", "create", "build", "art"]),
    (Category::LifeSkills, &["money", "budget", "home", "house", "practical"]),
];

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Rough listening time: half a second per word.
pub fn estimate_duration(transcript: &str) -> f64 {
    word_count(transcript) as f64 * SECONDS_PER_WORD
}

/// At most `max_len` characters, ending in "..." when cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

pub fn tags(transcript: &str, title: &str) -> TagSet {
    let text = format!("{} {}", title, transcript).to_lowercase();
    let mut tags = Vec::new();
    let mut topics = Vec::new();
    let mut seen = HashSet::new();

    for (topic, keywords) in THEME_KEYWORDS {
        let hits: Vec<&str> = keywords.iter().copied().filter(|k| text.contains(k)).collect();
        if hits.is_empty() {
            continue;
        }
        topics.push(topic.to_string());
        for hit in hits {
            if seen.insert(hit) {
                tags.push(hit.to_string());
            }
        }
    }
    tags.truncate(8);
    topics.truncate(5);

    TagSet {
        tags,
        topics,
        skills: vec!["life-experience".into(), "wisdom-sharing".into()],
    }
}

pub fn categorize(transcript: &str, title: &str) -> Category {
    let text = format!("{} {}", title, transcript).to_lowercase();
    let mut best: Option<(Category, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = keywords.iter().filter(|k| text.contains(*k)).count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((*category, score));
        }
    }
    best.map(|(c, _)| c).unwrap_or(Category::LifeSkills)
}

pub fn tone() -> EmotionalTone {
    EmotionalTone::default()
}

pub fn follow_ups(category: Category) -> Vec<String> {
    let questions: &[&str] = match category {
        Category::LifeSkills => &[
            "What would you do differently if you could go back?",
            "How did you learn this skill?",
            "What advice would you give to someone starting out?",
        ],
        Category::Professional => &[
            "What was the workplace culture like back then?",
            "How did you handle difficult colleagues?",
            "What skills were most valuable in your career?",
        ],
        Category::Relationships => &[
            "How did people meet partners in your day?",
            "What kept your relationships strong?",
            "How did you resolve conflicts?",
        ],
        _ => &[
            "Can you tell me more about that experience?",
            "What did you learn from this situation?",
            "How did this change your perspective?",
        ],
    };
    questions.iter().map(|q| q.to_string()).collect()
}

/// Jaccard overlap of lowercased interest and expertise labels.
pub fn match_score(interests: &[String], expertise: &[String]) -> f64 {
    if interests.is_empty() || expertise.is_empty() {
        return 0.0;
    }
    let a: HashSet<String> = interests.iter().map(|s| s.to_lowercase()).collect();
    let b: HashSet<String> = expertise.iter().map(|s| s.to_lowercase()).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_half_a_second_per_word() {
        let transcript = vec!["word"; 40].join(" ");
        assert_eq!(estimate_duration(&transcript), 20.0);
        assert_eq!(estimate_duration("   "), 0.0);
    }

    #[test]
    fn truncate_respects_limit() {
        let long = "a".repeat(400);
        let cut = truncate(&long, 150);
        assert_eq!(cut.chars().count(), 150);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short story", 150), "short story");

        let accented = "é".repeat(200);
        assert_eq!(truncate(&accented, 10).chars().count(), 10);
    }

    #[test]
    fn tags_are_deterministic_and_deduplicated() {
        let set = tags("I had to learn to cook for my family during the war", "Lessons");
        assert_eq!(set.topics, vec!["family", "cooking", "wisdom", "historical", "skills"]);
        assert_eq!(set.tags, vec!["family", "cook", "learn", "lesson", "war"]);
        assert_eq!(set.skills, vec!["life-experience", "wisdom-sharing"]);
        assert_eq!(set, tags("I had to learn to cook for my family during the war", "Lessons"));
    }

    #[test]
    fn categorize_picks_highest_score() {
        assert_eq!(
            categorize("my first job at the office, my boss ran the business", "Career"),
            Category::Professional
        );
        assert_eq!(categorize("the kitchen smelled of the recipe", ""), Category::Cooking);
        assert_eq!(categorize("zzz", "qqq"), Category::LifeSkills);
    }

    #[test]
    fn follow_ups_have_generic_default() {
        assert_eq!(follow_ups(Category::Professional).len(), 3);
        assert_eq!(
            follow_ups(Category::Travel)[0],
            "Can you tell me more about that experience?"
        );
    }

    #[test]
    fn match_score_is_jaccard() {
        let interests = vec!["Cooking".to_string(), "Travel".to_string()];
        let expertise = vec!["cooking".to_string(), "Crafts".to_string()];
        assert!((match_score(&interests, &expertise) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(match_score(&[], &expertise), 0.0);
    }
}
