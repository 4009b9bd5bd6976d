use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How far into the body the topic scan reaches, in characters.
const TOPIC_SCAN_CHARS: usize = 2000;

/// Every term that contributed to a score, stored alongside it so the
/// score is reproducible and explainable without recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub age_hours: f64,
    pub freshness: f64,
    pub source_weight: f64,
    pub topic_hits: usize,
    pub topic_score: f64,
    pub word_count: i64,
    pub length_penalty: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Exponential decay with half-relevance around 25 hours.
fn freshness(age_hours: f64) -> f64 {
    (-age_hours / 36.0).exp()
}

/// Count topics present in the title or the leading slice of the body.
/// Case-insensitive substring match; each topic counts at most once per
/// post no matter how often it repeats.
fn topic_hits(title: &str, content_text: &str, topics: &[String]) -> usize {
    let title = title.to_lowercase();
    let body: String = content_text
        .chars()
        .take(TOPIC_SCAN_CHARS)
        .collect::<String>()
        .to_lowercase();
    topics
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| title.contains(t.as_str()) || body.contains(t.as_str()))
        .count()
}

/// Pure scoring function: same inputs, bit-identical output. The caller
/// persists the result; nothing is written here.
pub fn score_post(
    now: DateTime<Utc>,
    published_at: DateTime<Utc>,
    source_weight: f64,
    title: &str,
    content_text: &str,
    word_count: i64,
    topics: &[String],
) -> ScoreResult {
    // A publish time in the future clamps to age 0 (maximal freshness)
    // rather than going negative.
    let age_hours = ((now - published_at).num_seconds() as f64 / 3600.0).max(0.0);
    let freshness = freshness(age_hours);

    let hits = topic_hits(title, content_text, topics);
    let topic_score = (hits as f64 * 0.15).min(0.6);

    let length_penalty = (word_count.max(0) as f64 / 2500.0).min(1.0) * 0.30;

    let score = 1.00 * freshness + 0.20 * source_weight + 0.70 * topic_score
        - 1.00 * length_penalty;

    let breakdown = ScoreBreakdown {
        age_hours: round_to(age_hours, 2),
        freshness: round_to(freshness, 4),
        source_weight: round_to(source_weight, 3),
        topic_hits: hits,
        topic_score: round_to(topic_score, 3),
        word_count,
        length_penalty: round_to(length_penalty, 3),
        final_score: round_to(score, 4),
    };
    ScoreResult { score, breakdown }
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn deterministic_across_calls() {
        let now = at(2026, 1, 10, 12, 0);
        let published = at(2026, 1, 9, 12, 0);
        let topics = vec!["rust".to_string(), "kafka".to_string()];
        let a = score_post(now, published, 1.0, "Rust async", "body text", 900, &topics);
        let b = score_post(now, published, 1.0, "Rust async", "body text", 900, &topics);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a.breakdown, b.breakdown);
    }

    #[test]
    fn zero_word_count_has_no_length_penalty() {
        let now = at(2026, 1, 10, 12, 0);
        let result = score_post(now, now, 0.5, "t", "", 0, &[]);
        assert_eq!(result.breakdown.length_penalty, 0.0);
    }

    #[test]
    fn empty_topics_score_zero() {
        let now = at(2026, 1, 10, 12, 0);
        let result = score_post(now, now, 0.5, "kafka kafka", "kafka", 100, &[]);
        assert_eq!(result.breakdown.topic_hits, 0);
        assert_eq!(result.breakdown.topic_score, 0.0);
    }

    #[test]
    fn brand_new_post_has_max_freshness() {
        let now = at(2026, 1, 10, 12, 0);
        let result = score_post(now, now, 0.0, "t", "", 0, &[]);
        assert_eq!(result.breakdown.age_hours, 0.0);
        assert_eq!(result.breakdown.freshness, 1.0);
    }

    #[test]
    fn future_publish_time_clamps_to_age_zero() {
        let now = at(2026, 1, 10, 12, 0);
        let published = at(2026, 1, 11, 12, 0);
        let result = score_post(now, published, 0.0, "t", "", 0, &[]);
        assert_eq!(result.breakdown.age_hours, 0.0);
        assert_eq!(result.breakdown.freshness, 1.0);
    }

    #[test]
    fn topic_counted_once_per_post() {
        let now = at(2026, 1, 10, 12, 0);
        let topics = vec!["kafka".to_string()];
        // Topic in the title and twice in the body still counts once.
        let result = score_post(
            now,
            now,
            0.0,
            "Kafka deep dive",
            "kafka is everywhere. kafka again.",
            100,
            &topics,
        );
        assert_eq!(result.breakdown.topic_hits, 1);
        assert_eq!(result.breakdown.topic_score, 0.15);
    }

    #[test]
    fn topic_score_saturates() {
        let now = at(2026, 1, 10, 12, 0);
        let topics: Vec<String> = ["a1", "b2", "c3", "d4", "e5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = score_post(now, now, 0.0, "a1 b2 c3 d4 e5", "", 0, &topics);
        assert_eq!(result.breakdown.topic_hits, 5);
        assert_eq!(result.breakdown.topic_score, 0.6);
    }

    #[test]
    fn topic_match_is_case_insensitive_substring() {
        let now = at(2026, 1, 10, 12, 0);
        let topics = vec!["PostgreSQL".to_string()];
        let result = score_post(now, now, 0.0, "scaling postgresql indexes", "", 0, &topics);
        assert_eq!(result.breakdown.topic_hits, 1);
    }

    #[test]
    fn topic_beyond_scan_region_is_ignored() {
        let now = at(2026, 1, 10, 12, 0);
        let topics = vec!["kafka".to_string()];
        let body = format!("{}kafka", "x".repeat(TOPIC_SCAN_CHARS));
        let result = score_post(now, now, 0.0, "title", &body, 100, &topics);
        assert_eq!(result.breakdown.topic_hits, 0);
    }

    #[test]
    fn weighted_scenario_matches_formula() {
        // weight 1.3, topics ["kafka"] matching once, 800 words, 2h old.
        let now = at(2026, 1, 10, 12, 0);
        let published = at(2026, 1, 10, 10, 0);
        let topics = vec!["kafka".to_string()];
        let result = score_post(
            now,
            published,
            1.3,
            "Why kafka compaction bites",
            "kafka kafka",
            800,
            &topics,
        );

        let freshness = (-2.0f64 / 36.0).exp();
        let expected = freshness + 0.20 * 1.3 + 0.70 * 0.15 - (800.0 / 2500.0) * 0.30;
        assert!((result.score - expected).abs() < 1e-12);
        assert!((result.score - 1.215).abs() < 1e-3);
        assert_eq!(result.breakdown.topic_hits, 1);
        assert_eq!(result.breakdown.length_penalty, 0.096);
    }

    #[test]
    fn very_long_posts_cap_the_penalty() {
        let now = at(2026, 1, 10, 12, 0);
        let result = score_post(now, now, 0.0, "t", "", 50_000, &[]);
        assert_eq!(result.breakdown.length_penalty, 0.30);
    }

    #[test]
    fn breakdown_alone_explains_the_score() {
        let now = at(2026, 1, 10, 12, 0);
        let published = at(2026, 1, 9, 0, 0);
        let topics = vec!["rust".to_string()];
        let result = score_post(now, published, 0.8, "rust tips", "rust", 1200, &topics);
        let b = &result.breakdown;
        let reconstructed = b.freshness + 0.20 * b.source_weight + 0.70 * b.topic_score
            - b.length_penalty;
        // Rounded terms reconstruct the rounded final within rounding slack.
        assert!((reconstructed - b.final_score).abs() < 1e-3);
    }
}
