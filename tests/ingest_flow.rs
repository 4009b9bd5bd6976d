use chrono::Utc;
use tempfile::TempDir;

use techread::db::Repository;
use techread::hash::cache_key;
use techread::ingest::{FeedEntry, IngestCoordinator};
use techread::models::{NewSource, Source};

async fn setup() -> (TempDir, Repository, Source) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::new(dir.path().join("techread.db").to_str().unwrap())
        .await
        .unwrap();
    let sid = repo
        .insert_source(NewSource {
            name: "feed".to_string(),
            url: "https://f.example/rss".to_string(),
            weight: 1.0,
            tags: String::new(),
        })
        .await
        .unwrap();
    let source = repo.get_source(sid).await.unwrap().unwrap();
    (dir, repo, source)
}

fn cache_dir(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("cache")
}

/// Seed the HTML cache so the fetcher never touches the network.
fn seed_html(dir: &TempDir, url: &str, words: usize) {
    let html_dir = cache_dir(dir).join("html");
    std::fs::create_dir_all(&html_dir).unwrap();
    let body = vec!["word"; words].join(" ");
    std::fs::write(
        html_dir.join(format!("{}.html", cache_key(url))),
        format!("<html><body><p>{body}</p></body></html>"),
    )
    .unwrap();
}

fn entry(url: &str) -> FeedEntry {
    FeedEntry {
        title: format!("Entry {url}"),
        url: url.to_string(),
        author: "someone".to_string(),
        published: Some(Utc::now()),
    }
}

#[tokio::test]
async fn same_url_twice_in_one_batch_inserts_once() {
    let (dir, repo, source) = setup().await;
    let url = "https://posts.example/dup";
    seed_html(&dir, url, 600);

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 0);
    let report = coordinator
        .ingest_entries(&source, vec![entry(url), entry(url)])
        .await;

    assert_eq!(report.new_posts, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(repo.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn repeated_ingest_runs_are_idempotent() {
    let (dir, repo, source) = setup().await;
    for i in 0..3 {
        seed_html(&dir, &format!("https://posts.example/{i}"), 600);
    }
    let entries: Vec<FeedEntry> = (0..3)
        .map(|i| entry(&format!("https://posts.example/{i}")))
        .collect();

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 0);
    let first = coordinator.ingest_entries(&source, entries.clone()).await;
    assert_eq!(first.new_posts, 3);
    let count_after_first = repo.count_posts().await.unwrap();

    let second = coordinator.ingest_entries(&source, entries).await;
    assert_eq!(second.new_posts, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(repo.count_posts().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn short_extractions_are_skipped_and_logged() {
    let (dir, repo, source) = setup().await;
    let url = "https://posts.example/short";
    seed_html(&dir, url, 10);

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 500);
    let report = coordinator.ingest_entries(&source, vec![entry(url)]).await;

    assert_eq!(report.new_posts, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(repo.count_posts().await.unwrap(), 0);

    let log = std::fs::read_to_string(cache_dir(&dir).join("invalid_posts.log")).unwrap();
    assert!(log.contains(url));
    assert!(log.contains("below_min_word_count(500)"));
}

#[tokio::test]
async fn empty_extraction_still_inserts_the_post() {
    let (dir, repo, source) = setup().await;
    let url = "https://posts.example/empty";
    // Cached page with no extractable text.
    let html_dir = cache_dir(&dir).join("html");
    std::fs::create_dir_all(&html_dir).unwrap();
    std::fs::write(html_dir.join(format!("{}.html", cache_key(url))), "").unwrap();

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 500);
    let report = coordinator.ingest_entries(&source, vec![entry(url)]).await;
    assert_eq!(report.new_posts, 1);

    let posts = repo.count_posts().await.unwrap();
    assert_eq!(posts, 1);
    let post = repo.get_post(1).await.unwrap().unwrap();
    assert_eq!(post.word_count, 0);
    assert_eq!(post.content_text, "");
    assert_eq!(post.content_hash, "");
}

#[tokio::test]
async fn fetch_failure_inserts_metadata_only() {
    let (dir, repo, source) = setup().await;
    // Nothing cached and the host cannot resolve: the fetch fails, the
    // feed metadata still lands as a discoverable post.
    let url = "https://no-such-host.invalid/article";

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 500);
    let report = coordinator.ingest_entries(&source, vec![entry(url)]).await;

    assert_eq!(report.new_posts, 1);
    assert_eq!(report.fetch_failures, 1);
    let post = repo.get_post(1).await.unwrap().unwrap();
    assert_eq!(post.word_count, 0);
    assert_eq!(post.content_text, "");
    assert_eq!(post.url, url);
    assert_eq!(post.title, format!("Entry {url}"));
}

#[tokio::test]
async fn successful_extraction_stores_hash_and_word_count() {
    let (dir, repo, source) = setup().await;
    let url = "https://posts.example/full";
    seed_html(&dir, url, 750);

    let coordinator = IngestCoordinator::new(&repo, cache_dir(&dir), 500);
    let report = coordinator.ingest_entries(&source, vec![entry(url)]).await;
    assert_eq!(report.new_posts, 1);

    let post = repo.get_post(1).await.unwrap().unwrap();
    assert_eq!(post.word_count, 750);
    assert_eq!(post.content_hash.len(), 64);
    assert_eq!(
        post.content_hash,
        techread::hash::content_version(&post.content_text)
    );
}
