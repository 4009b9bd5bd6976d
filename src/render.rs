use crate::db::RankedPost;
use crate::digest::reading_minutes;
use crate::models::Source;
use crate::rank::ScoreBreakdown;

pub fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        println!("No sources. Add one with: techread sources add <rss_url>");
        return;
    }
    println!(
        "{:>4}  {:^7}  {:>6}  {:<28}  {:<40}  tags",
        "id", "enabled", "weight", "name", "url"
    );
    for s in sources {
        println!(
            "{:>4}  {:^7}  {:>6.2}  {:<28}  {:<40}  {}",
            s.id,
            if s.enabled { "yes" } else { "-" },
            s.weight,
            truncate(&s.name, 28),
            truncate(&s.url, 40),
            s.tags,
        );
    }
}

pub fn print_ranked(posts: &[RankedPost], show_breakdown: bool) {
    println!(
        "{:>4}  {:>4}  {:^5}  {:>6}  {:>4}  title",
        "rank", "id", "state", "score", "mins"
    );
    for (i, p) in posts.iter().enumerate() {
        let mins = if p.word_count > 0 {
            reading_minutes(p.word_count)
        } else {
            0
        };
        let why = if show_breakdown {
            breakdown_line(&p.breakdown_json)
        } else {
            String::new()
        };
        println!(
            "{:>4}  {:>4}  {:^5}  {:>6.3}  {:>4}  {}",
            i + 1,
            p.id,
            state_letter(p),
            p.score,
            mins,
            p.title,
        );
        if !why.is_empty() {
            println!("{:>29}  {why}", "");
        }
    }
}

pub fn print_digest(items: &[(RankedPost, String)]) {
    println!("Today's techread digest");
    for (i, (p, one_liner)) in items.iter().enumerate() {
        println!("#{} [{}m] {}", i + 1, reading_minutes(p.word_count), p.title);
        if !one_liner.is_empty() {
            println!("  * {one_liner}");
        }
        println!("  id={}  {}", p.id, p.url);
        println!();
    }
}

fn state_letter(post: &RankedPost) -> String {
    post.read_state
        .as_str()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

fn breakdown_line(breakdown_json: &str) -> String {
    match serde_json::from_str::<ScoreBreakdown>(breakdown_json) {
        Ok(b) => format!(
            "fresh {} | topic {} | len -{}",
            b.freshness, b.topic_hits, b.length_penalty
        ),
        Err(_) => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
