use chrono::Utc;
use tempfile::TempDir;

use techread::db::Repository;
use techread::models::{NewPost, NewSource, ReadState, SummaryMode};

async fn test_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("techread.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, repo)
}

fn source(url: &str) -> NewSource {
    NewSource {
        name: format!("source {url}"),
        url: url.to_string(),
        weight: 1.0,
        tags: "rust,testing".to_string(),
    }
}

fn post(source_id: i64, url: &str, word_count: i64) -> NewPost {
    NewPost {
        source_id,
        title: format!("post {url}"),
        url: url.to_string(),
        author: "a. writer".to_string(),
        published_at: Utc::now().to_rfc3339(),
        content_text: if word_count > 0 {
            vec!["word"; word_count as usize].join(" ")
        } else {
            String::new()
        },
        content_hash: if word_count > 0 {
            techread::hash::content_version("text")
        } else {
            String::new()
        },
        word_count,
    }
}

#[tokio::test]
async fn duplicate_post_url_is_a_noop() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://f.example/rss")).await.unwrap();

    let first = repo.insert_post(post(sid, "https://f.example/1", 600)).await.unwrap();
    assert!(first.is_some());

    // Same URL again, even from another source: first writer wins.
    let sid2 = repo.insert_source(source("https://g.example/rss")).await.unwrap();
    let second = repo.insert_post(post(sid2, "https://f.example/1", 600)).await.unwrap();
    assert!(second.is_none());
    assert_eq!(repo.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_source_url_is_rejected() {
    let (_dir, repo) = test_repo().await;
    repo.insert_source(source("https://f.example/rss")).await.unwrap();
    assert!(repo.insert_source(source("https://f.example/rss")).await.is_err());
}

#[tokio::test]
async fn read_state_round_trips() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://f.example/rss")).await.unwrap();
    let pid = repo
        .insert_post(post(sid, "https://f.example/1", 600))
        .await
        .unwrap()
        .unwrap();

    let stored = repo.get_post(pid).await.unwrap().unwrap();
    assert_eq!(stored.read_state, ReadState::Unread);

    assert!(repo.set_read_state(pid, ReadState::Saved).await.unwrap());
    let stored = repo.get_post(pid).await.unwrap().unwrap();
    assert_eq!(stored.read_state, ReadState::Saved);

    // Unknown post id reports false instead of failing.
    assert!(!repo.set_read_state(9999, ReadState::Read).await.unwrap());
}

#[tokio::test]
async fn score_upsert_overwrites_without_history() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://f.example/rss")).await.unwrap();
    let pid = repo
        .insert_post(post(sid, "https://f.example/1", 600))
        .await
        .unwrap()
        .unwrap();

    assert!(!repo.has_score(pid).await.unwrap());
    repo.upsert_score(pid, 0.5, "{\"v\":1}".to_string()).await.unwrap();
    repo.upsert_score(pid, 0.9, "{\"v\":2}".to_string()).await.unwrap();

    let score = repo.get_score(pid).await.unwrap().unwrap();
    assert_eq!(score.score, 0.9);
    assert_eq!(score.breakdown_json, "{\"v\":2}");
}

#[tokio::test]
async fn summary_key_is_the_full_tuple_and_first_writer_wins() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://f.example/rss")).await.unwrap();
    let pid = repo
        .insert_post(post(sid, "https://f.example/1", 600))
        .await
        .unwrap()
        .unwrap();

    repo.insert_summary(pid, SummaryMode::Short, "m1", "hash-a", "first")
        .await
        .unwrap();
    // Same key again is ignored, not replaced.
    repo.insert_summary(pid, SummaryMode::Short, "m1", "hash-a", "second")
        .await
        .unwrap();
    let hit = repo
        .get_summary(pid, SummaryMode::Short, "m1", "hash-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.summary_text, "first");

    // Every distinct (mode, model, hash) combination may coexist.
    repo.insert_summary(pid, SummaryMode::Bullets, "m1", "hash-a", "bullets")
        .await
        .unwrap();
    repo.insert_summary(pid, SummaryMode::Short, "m2", "hash-a", "other model")
        .await
        .unwrap();
    repo.insert_summary(pid, SummaryMode::Short, "m1", "hash-b", "new content")
        .await
        .unwrap();
    assert!(repo
        .get_summary(pid, SummaryMode::Bullets, "m1", "hash-a")
        .await
        .unwrap()
        .is_some());
    assert!(repo
        .get_summary(pid, SummaryMode::Short, "m2", "hash-a")
        .await
        .unwrap()
        .is_some());
    assert!(repo
        .get_summary(pid, SummaryMode::Short, "m1", "hash-b")
        .await
        .unwrap()
        .is_some());
    // A key that was never written stays a miss.
    assert!(repo
        .get_summary(pid, SummaryMode::Takeaways, "m1", "hash-a")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn purge_removes_short_posts_and_their_records() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://f.example/rss")).await.unwrap();
    let short = repo
        .insert_post(post(sid, "https://f.example/short", 50))
        .await
        .unwrap()
        .unwrap();
    let long = repo
        .insert_post(post(sid, "https://f.example/long", 900))
        .await
        .unwrap()
        .unwrap();
    repo.upsert_score(short, 0.1, "{}".to_string()).await.unwrap();
    repo.insert_summary(short, SummaryMode::Short, "m", "h", "s")
        .await
        .unwrap();

    assert_eq!(repo.count_short_posts(500, vec![]).await.unwrap(), 1);
    assert_eq!(repo.purge_short_posts(500, vec![]).await.unwrap(), 1);

    assert!(repo.get_post(short).await.unwrap().is_none());
    assert!(repo.get_score(short).await.unwrap().is_none());
    assert!(repo
        .get_summary(short, SummaryMode::Short, "m", "h")
        .await
        .unwrap()
        .is_none());
    assert!(repo.get_post(long).await.unwrap().is_some());
}

#[tokio::test]
async fn disabling_a_source_hides_it_from_ingestion() {
    let (_dir, repo) = test_repo().await;
    let a = repo.insert_source(source("https://a.example/rss")).await.unwrap();
    let b = repo.insert_source(source("https://b.example/rss")).await.unwrap();

    assert!(repo.set_source_enabled(a, false).await.unwrap());
    let enabled = repo.get_enabled_sources().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].id, b);

    // All sources remain visible for management.
    assert_eq!(repo.get_all_sources().await.unwrap().len(), 2);
    assert!(!repo.set_source_enabled(999, true).await.unwrap());
}

#[tokio::test]
async fn source_meta_update_keeps_unspecified_fields() {
    let (_dir, repo) = test_repo().await;
    let sid = repo.insert_source(source("https://a.example/rss")).await.unwrap();

    repo.update_source_meta(sid, Some("Fresh Name".to_string()), None)
        .await
        .unwrap();
    let stored = repo.get_source(sid).await.unwrap().unwrap();
    assert_eq!(stored.name, "Fresh Name");
    assert_eq!(stored.tags, "rust,testing");
}
