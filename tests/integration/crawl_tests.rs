//! Integration tests for the crawler
//!
//! These tests use wiremock to serve catalog and chapter pages and run
//! whole crawl jobs end-to-end against a temporary SQLite database.

use novel_ripple::config::{Config, SelectorProfile};
use novel_ripple::crawler::{ChapterError, JobOutcome};
use novel_ripple::state::JobState;
use novel_ripple::{ChapterKey, Coordinator, CrawlError, CrawlOptions, FetchError, ParseError};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to a fresh temporary database
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.workers = 4;
    config.crawler.request_timeout_secs = 1;
    config.crawler.retry_delay_ms = 10;
    config.user_agent.value = "TestAgent/1.0".to_string();
    config.storage.database_path = dir
        .path()
        .join("novels.db")
        .to_string_lossy()
        .into_owned();
    config
}

fn create_coordinator(config: Config) -> Coordinator {
    Coordinator::new(config, "test-hash").expect("Failed to create coordinator")
}

fn catalog_page(title: &str, hrefs: &[(&str, &str)]) -> String {
    let links: String = hrefs
        .iter()
        .map(|(href, text)| format!("<dd><a href=\"{}\">{}</a></dd>\n", href, text))
        .collect();
    format!(
        "<html><body><h1>{}</h1><div id=\"list\"><dl>\n{}</dl></div></body></html>",
        title, links
    )
}

fn chapter_page(text: &str) -> String {
    format!(
        "<html><body><h1>Chapter</h1><div id=\"content\"><p>{}</p><p>请收藏本站</p></div></body></html>",
        text
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts "Test Novel" with three chapters; `/c2.html` answers after 3s
async fn mount_test_novel(server: &MockServer) -> String {
    mount_page(
        server,
        "/book/",
        catalog_page(
            "Test Novel",
            &[
                ("/c1.html", "Chapter 1"),
                ("/c2.html", "Chapter 2"),
                ("/c3.html", "Chapter 3"),
            ],
        ),
    )
    .await;
    mount_page(server, "/c1.html", chapter_page("第一章正文")).await;
    Mock::given(method("GET"))
        .and(path("/c2.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(chapter_page("第二章正文"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(server)
        .await;
    mount_page(server, "/c3.html", chapter_page("第三章正文")).await;

    format!("{}/book/", server.uri())
}

#[tokio::test]
async fn test_partial_failure_commits_remaining_chapters() {
    let server = MockServer::start().await;
    let url = mount_test_novel(&server).await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let report = coordinator
        .run(&url, CrawlOptions::default(), CancellationToken::new())
        .await
        .expect("Job should start");

    assert_eq!(report.novel_key.as_deref(), Some("Test Novel"));
    let JobOutcome::Created(tally) = &report.outcome else {
        panic!("Expected Created outcome, got {:?}", report.outcome);
    };
    assert_eq!((tally.discovered, tally.fetched, tally.failed), (3, 2, 1));
    assert_eq!(tally.failures.len(), 1);
    assert_eq!(tally.failures[0].key, ChapterKey::new("Test Novel", "c2"));
    assert_eq!(tally.failures[0].error, ChapterError::Fetch(FetchError::Timeout));

    // Catalog is complete and ordered
    let catalog = coordinator.get_catalog("Test Novel").unwrap();
    let ordinals: Vec<u32> = catalog.iter().map(|c| c.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    let titles: Vec<&str> = catalog.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2", "Chapter 3"]);

    // Timed-out chapter has no content; siblings are cleaned
    assert!(coordinator
        .get_chapter_content(&ChapterKey::new("Test Novel", "c2"))
        .unwrap()
        .is_none());
    let chapter = coordinator
        .get_chapter_content(&ChapterKey::new("Test Novel", "c1"))
        .unwrap()
        .expect("Chapter 1 should be stored");
    assert_eq!(chapter.title, "Chapter 1");
    assert_eq!(chapter.text, "第一章正文");

    // Job row carries the final counts
    let job = coordinator.get_job(report.job_id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.novel_key.as_deref(), Some("Test Novel"));
    assert_eq!((job.counts.discovered, job.counts.fetched, job.counts.failed), (3, 2, 1));
    assert_eq!(job.config_hash, "test-hash");
}

#[tokio::test]
async fn test_recrawl_reports_already_exists() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Test Novel", &[("/c1.html", "Chapter 1"), ("/c2.html", "Chapter 2")]),
    )
    .await;
    // Chapters must be fetched exactly once across both crawls
    for route in ["/c1.html", "/c2.html"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page("正文")))
            .expect(1)
            .mount(&server)
            .await;
    }
    let url = format!("{}/book/", server.uri());
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let first = coordinator
        .run(&url, CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(first.outcome, JobOutcome::Created(_)));

    let second = coordinator
        .run(&url, CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        second.outcome,
        JobOutcome::AlreadyExists {
            novel_key: "Test Novel".to_string()
        }
    );

    let novels = coordinator.list_novels().unwrap();
    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].chapter_count, 2);
    assert_eq!(novels[0].content_count, 2);
    assert_eq!(coordinator.get_catalog("Test Novel").unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_catalog_creates_novel_without_chapters() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        "<html><body><h1>Lonely Novel</h1><p>Coming soon</p></body></html>".to_string(),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let report = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let JobOutcome::Created(tally) = &report.outcome else {
        panic!("Expected Created outcome, got {:?}", report.outcome);
    };
    assert_eq!(tally.discovered, 0);
    assert!(coordinator.get_novel("Lonely Novel").unwrap().is_some());
    assert!(coordinator.get_catalog("Lonely Novel").unwrap().is_empty());
    assert_eq!(coordinator.get_job(report.job_id).unwrap().state, JobState::Completed);
}

#[tokio::test]
async fn test_catalog_fetch_failure_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let report = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .expect("A failed catalog fetch is an outcome, not an error");

    let JobOutcome::Failed { reason } = &report.outcome else {
        panic!("Expected Failed outcome, got {:?}", report.outcome);
    };
    assert!(reason.contains("404"));
    assert!(report.novel_key.is_none());
    assert!(coordinator.list_novels().unwrap().is_empty());

    let job = coordinator.get_job(report.job_id).unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error_message.is_some());
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_invalid_url_never_starts() {
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let result = coordinator
        .run("mailto:someone@example.com", CrawlOptions::default(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(CrawlError::Url(_))));

    let result = coordinator.start_crawl("://nope", CrawlOptions::default());
    assert!(matches!(result, Err(CrawlError::Url(_))));

    assert_eq!(coordinator.library_stats().unwrap().total_jobs(), 0);
}

#[tokio::test]
async fn test_missing_content_container_is_chapter_failure() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Sparse Novel", &[("/1.html", "One"), ("/2.html", "Two")]),
    )
    .await;
    mount_page(&server, "/1.html", chapter_page("正文")).await;
    mount_page(
        &server,
        "/2.html",
        "<html><body><div id=\"ads\">广告</div></body></html>".to_string(),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let report = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let tally = report.outcome.tally().expect("Expected chapter counts");
    assert_eq!((tally.fetched, tally.failed), (1, 1));
    assert_eq!(
        tally.failures[0].error,
        ChapterError::Parse(ParseError::ContentNotFound)
    );
}

#[tokio::test]
async fn test_transient_failure_retried_within_job() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Flaky Novel", &[("/1.html", "One")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/1.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/1.html", chapter_page("正文")).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawler.max_retries = 1;
    let coordinator = create_coordinator(config);

    let report = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let tally = report.outcome.tally().unwrap();
    assert_eq!((tally.fetched, tally.failed), (1, 0));
}

#[tokio::test]
async fn test_retry_missing_recovers_failed_chapters() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Flaky Novel", &[("/1.html", "One"), ("/2.html", "Two")]),
    )
    .await;
    mount_page(&server, "/1.html", chapter_page("第一章")).await;
    Mock::given(method("GET"))
        .and(path("/2.html"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/2.html", chapter_page("第二章")).await;

    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let first = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    let tally = first.outcome.tally().unwrap();
    assert_eq!(tally.failures[0].error, ChapterError::Fetch(FetchError::HttpStatus(500)));

    let retry = coordinator
        .retry_missing("Flaky Novel", CancellationToken::new())
        .await
        .unwrap();
    let JobOutcome::Recovered(tally) = &retry.outcome else {
        panic!("Expected Recovered outcome, got {:?}", retry.outcome);
    };
    assert_eq!((tally.discovered, tally.fetched, tally.failed), (1, 1, 0));

    let chapter = coordinator
        .get_chapter_content(&ChapterKey::new("Flaky Novel", "2"))
        .unwrap()
        .unwrap();
    assert_eq!(chapter.text, "第二章");
    assert_eq!(chapter.ordinal, 2);

    // Nothing left to recover
    let again = coordinator
        .retry_missing("Flaky Novel", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.outcome.counts().discovered, 0);
}

#[tokio::test]
async fn test_refresh_replaces_catalog() {
    let old_site = MockServer::start().await;
    mount_page(
        &old_site,
        "/book/",
        catalog_page("Moving Novel", &[("/a.html", "A"), ("/b.html", "B"), ("/c.html", "C")]),
    )
    .await;
    for route in ["/a.html", "/b.html", "/c.html"] {
        mount_page(&old_site, route, chapter_page("旧")).await;
    }

    let new_site = MockServer::start().await;
    mount_page(
        &new_site,
        "/book/",
        catalog_page("Moving Novel", &[("/x.html", "X"), ("/y.html", "Y")]),
    )
    .await;
    for route in ["/x.html", "/y.html"] {
        mount_page(&new_site, route, chapter_page("新")).await;
    }

    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));
    coordinator
        .run(&format!("{}/book/", old_site.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let report = coordinator
        .run(
            &format!("{}/book/", new_site.uri()),
            CrawlOptions { refresh: true },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(matches!(report.outcome, JobOutcome::Refreshed(_)));

    let catalog = coordinator.get_catalog("Moving Novel").unwrap();
    let ids: Vec<&str> = catalog.iter().map(|c| c.chapter_id.as_str()).collect();
    assert_eq!(ids, vec!["x", "y"]);
    assert!(coordinator
        .get_chapter_content(&ChapterKey::new("Moving Novel", "a"))
        .unwrap()
        .is_none());
    assert_eq!(coordinator.library_stats().unwrap().contents, 2);
}

#[tokio::test]
async fn test_start_crawl_handle_reports_progress() {
    let server = MockServer::start().await;
    let url = mount_test_novel(&server).await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let handle = coordinator
        .start_crawl(&url, CrawlOptions::default())
        .unwrap();
    let job_id = handle.job_id();
    let updates = handle.subscribe();

    let report = handle.wait().await.unwrap();
    assert_eq!(report.job_id, job_id);
    assert_eq!(report.outcome.counts().failed, 1);
    assert_eq!(*updates.borrow(), JobState::Completed);
}

#[tokio::test]
async fn test_concurrent_crawls_of_same_novel() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Shared Novel", &[("/1.html", "One"), ("/2.html", "Two")]),
    )
    .await;
    mount_page(&server, "/1.html", chapter_page("一")).await;
    mount_page(&server, "/2.html", chapter_page("二")).await;
    let url = format!("{}/book/", server.uri());

    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let first = coordinator.start_crawl(&url, CrawlOptions::default()).unwrap();
    let second = coordinator.start_crawl(&url, CrawlOptions::default()).unwrap();
    let (a, b) = tokio::join!(first.wait(), second.wait());
    let outcomes = [a.unwrap().outcome, b.unwrap().outcome];

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, JobOutcome::Created(_)))
        .count();
    let existing = outcomes
        .iter()
        .filter(|o| matches!(o, JobOutcome::AlreadyExists { .. }))
        .count();
    assert_eq!((created, existing), (1, 1));
    assert_eq!(coordinator.list_novels().unwrap().len(), 1);
    assert_eq!(coordinator.get_catalog("Shared Novel").unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancel_before_catalog_commit() {
    let server = MockServer::start().await;
    let url = mount_test_novel(&server).await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = coordinator
        .run(&url, CrawlOptions::default(), cancel)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        JobOutcome::Cancelled {
            phase: JobState::FetchingCatalog
        }
    );
    assert!(coordinator.list_novels().unwrap().is_empty());
    assert_eq!(coordinator.get_job(report.job_id).unwrap().state, JobState::Cancelled);
}

#[tokio::test]
async fn test_cancel_before_content_commit() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        catalog_page("Slow Novel", &[("/1.html", "One"), ("/2.html", "Two")]),
    )
    .await;
    for route in ["/1.html", "/2.html"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(chapter_page("正文"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
    }
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawler.request_timeout_secs = 5;
    let coordinator = create_coordinator(config);

    let handle = coordinator
        .start_crawl(&format!("{}/book/", server.uri()), CrawlOptions::default())
        .unwrap();
    let mut updates = handle.subscribe();
    updates
        .wait_for(|state| *state == JobState::FetchingChapters)
        .await
        .unwrap();
    handle.cancel();

    let report = handle.wait().await.unwrap();
    assert_eq!(
        report.outcome,
        JobOutcome::Cancelled {
            phase: JobState::FetchingChapters
        }
    );

    // Catalog stays committed; no content was written
    assert_eq!(coordinator.get_catalog("Slow Novel").unwrap().len(), 2);
    assert_eq!(coordinator.library_stats().unwrap().contents, 0);
}

#[tokio::test]
async fn test_site_profile_selectors_and_boilerplate() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/",
        r#"<html><body><div class="book-title">Profiled Novel</div>
            <ul class="chapters"><li><a href="/read/100">First</a></li></ul>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        &server,
        "/read/100",
        r#"<div id="text">正文开始 SITE-AD 结尾</div>"#.to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    let mut profile = SelectorProfile::builtin();
    profile.name = "test-site".to_string();
    profile.hosts = vec!["127.0.0.1".to_string()];
    profile.title = vec![".book-title".to_string()];
    profile.catalog = vec![".chapters".to_string()];
    profile.content = vec!["#text".to_string()];
    profile.boilerplate = vec!["site-ad".to_string()];
    config.profiles.push(profile);
    let coordinator = create_coordinator(config);

    let report = coordinator
        .run(&format!("{}/book/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome.counts().fetched, 1);

    let chapter = coordinator
        .get_chapter_content(&ChapterKey::new("Profiled Novel", "100"))
        .unwrap()
        .unwrap();
    assert_eq!(chapter.text, "正文开始\n结尾");
}

#[tokio::test]
async fn test_untitled_novel_keyed_by_url_slug() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/book/77/",
        r#"<div id="list"><a href="/book/77/1.html">One</a></div>"#.to_string(),
    )
    .await;
    mount_page(&server, "/book/77/1.html", chapter_page("正文")).await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));

    let report = coordinator
        .run(&format!("{}/book/77/", server.uri()), CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.novel_key.as_deref(), Some("127.0.0.1-book-77"));
    let novel = coordinator.get_novel("127.0.0.1-book-77").unwrap().unwrap();
    assert_eq!(novel.title, "Unknown Title");
}

#[tokio::test]
async fn test_delete_novel_removes_everything() {
    let server = MockServer::start().await;
    let url = mount_test_novel(&server).await;
    let dir = TempDir::new().unwrap();
    let coordinator = create_coordinator(create_test_config(&dir));
    let report = coordinator
        .run(&url, CrawlOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.outcome.is_success());

    let id = coordinator.get_novel("Test Novel").unwrap().unwrap().id;
    assert!(coordinator.delete_novel(&id.to_string()).unwrap());

    let stats = coordinator.library_stats().unwrap();
    assert_eq!((stats.novels, stats.chapters, stats.contents), (0, 0, 0));
    assert!(!coordinator.delete_novel("Test Novel").unwrap());
}
