//! Crawl coordinator - job orchestration
//!
//! One coordinating routine per job drives the state machine
//! `Pending -> FetchingCatalog -> FetchingChapters -> Committing -> Completed`:
//! - Fetch and parse the catalog sequentially
//! - Commit the novel and its catalog as one atomic batch, or stop early if
//!   the novel is already stored
//! - Fan chapter work out over a bounded worker pool
//! - Commit every successful chapter body in one batch
//!
//! Workers never touch the store. They return plain `(ChapterKey, text)`
//! results and only this module writes, through the store's atomic batch
//! operations.

use crate::config::Config;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::job::{
    ChapterError, ChapterFailure, ChapterTally, CrawlOptions, JobHandle, JobOutcome, JobReport,
};
use crate::crawler::sanitizer::Sanitizer;
use crate::output::{load_statistics, LibraryStatistics};
use crate::state::JobState;
use crate::storage::{
    lookup_novel, open_store, ChapterKey, ChapterRef, ChapterView, JobRecord, NewNovel, Novel,
    NovelSummary, SqliteStore, StorageError, StorageResult, Store,
};
use crate::url::parse_source_url;
use crate::{CrawlError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Main crawler coordinator
///
/// Cheap to clone; clones share the HTTP client and the store.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: Arc<str>,
    fetcher: Fetcher,
    store: Arc<Mutex<SqliteStore>>,
}

/// What a job does after it starts
enum JobKind {
    Crawl(CrawlOptions),
    Retry { novel_key: String },
}

/// Bookkeeping for one running job
struct JobRun {
    id: i64,
    state: JobState,
    updates: watch::Sender<JobState>,
    novel_key: Option<String>,
}

/// Everything a chapter worker needs, shared across tasks
#[derive(Clone)]
struct ChapterWorker {
    fetcher: Fetcher,
    extractor: Arc<Extractor>,
    sanitizer: Arc<Sanitizer>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChapterWorker {
    /// Fetch, extract and clean one chapter
    ///
    /// Transient fetch failures are retried up to `max_retries` times.
    async fn fetch_chapter(&self, chapter: &ChapterRef) -> std::result::Result<String, ChapterError> {
        let mut attempt = 0;
        let body = loop {
            match self.fetcher.fetch(&chapter.url).await {
                Ok(body) => break body,
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} after {} (attempt {}/{})",
                        chapter.url,
                        e,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let raw = self.extractor.extract_content(&body)?;
        let text = self.sanitizer.clean(&raw);
        if text.is_empty() {
            return Err(ChapterError::EmptyContent);
        }
        Ok(text)
    }
}

impl Coordinator {
    /// Creates a coordinator over the configured database file
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Digest recorded on every job row
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self> {
        crate::config::validate(&config)?;
        let store = open_store(Path::new(&config.storage.database_path))?;
        Self::with_store(config, config_hash, store)
    }

    /// Creates a coordinator over an already opened store
    pub fn with_store(
        config: Config,
        config_hash: impl Into<String>,
        store: SqliteStore,
    ) -> Result<Self> {
        crate::config::validate(&config)?;
        let fetcher = Fetcher::new(&config)?;
        let config_hash: String = config_hash.into();
        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            fetcher,
            store: Arc::new(Mutex::new(store)),
        })
    }

    /// Starts a crawl job in the background
    ///
    /// An invalid URL is rejected here and no job is recorded.
    pub fn start_crawl(&self, source_url: &str, options: CrawlOptions) -> Result<JobHandle> {
        let url = parse_source_url(source_url)?;
        let worker = self.worker_for(&url)?;
        let (job, updates) = self.open_job(&url)?;
        let job_id = job.id;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let coordinator = self.clone();
        let task = tokio::spawn(async move {
            coordinator
                .run_job(job, url, JobKind::Crawl(options), worker, token)
                .await
        });

        Ok(JobHandle::new(job_id, updates, cancel, task))
    }

    /// Runs a crawl job to completion on the current task
    pub async fn run(
        &self,
        source_url: &str,
        options: CrawlOptions,
        cancel: CancellationToken,
    ) -> Result<JobReport> {
        let url = parse_source_url(source_url)?;
        let worker = self.worker_for(&url)?;
        let (job, _updates) = self.open_job(&url)?;
        self.run_job(job, url, JobKind::Crawl(options), worker, cancel)
            .await
    }

    /// Fetches again every chapter of a stored novel that has no content
    ///
    /// The catalog is read from the store, not re-crawled.
    pub async fn retry_missing(&self, novel: &str, cancel: CancellationToken) -> Result<JobReport> {
        let novel = self
            .get_novel(novel)?
            .ok_or_else(|| StorageError::NovelNotFound(novel.to_string()))?;
        let url = parse_source_url(&novel.source_url)?;
        let worker = self.worker_for(&url)?;
        let (job, _updates) = self.open_job(&url)?;
        let kind = JobKind::Retry {
            novel_key: novel.key,
        };
        self.run_job(job, url, kind, worker, cancel).await
    }

    /// Returns a novel's catalog ordered by ordinal
    ///
    /// `novel` is a natural key or a numeric row id.
    pub fn get_catalog(&self, novel: &str) -> Result<Vec<ChapterRef>> {
        let novel = self
            .get_novel(novel)?
            .ok_or_else(|| StorageError::NovelNotFound(novel.to_string()))?;
        self.locked(|store| store.get_catalog(&novel.key))
    }

    /// Returns a chapter's title and cleaned text, if its content is stored
    pub fn get_chapter_content(&self, key: &ChapterKey) -> Result<Option<ChapterView>> {
        self.locked(|store| store.get_chapter(key))
    }

    /// Finds a novel by natural key or numeric row id
    pub fn get_novel(&self, key_or_id: &str) -> Result<Option<Novel>> {
        self.locked(|store| lookup_novel(&*store, key_or_id))
    }

    pub fn list_novels(&self) -> Result<Vec<NovelSummary>> {
        self.locked(|store| store.list_novels())
    }

    /// Deletes a novel with its chapters and content; false if unknown
    pub fn delete_novel(&self, novel: &str) -> Result<bool> {
        let Some(novel) = self.get_novel(novel)? else {
            return Ok(false);
        };
        tracing::info!("Deleting novel '{}'", novel.key);
        self.locked(|store| store.delete_novel(&novel.key))
    }

    pub fn get_job(&self, job_id: i64) -> Result<JobRecord> {
        self.locked(|store| store.get_job(job_id))
    }

    pub fn library_stats(&self) -> Result<LibraryStatistics> {
        self.locked(|store| load_statistics(&*store))
    }

    /// Runs one store operation under the lock
    ///
    /// The lock is never held across an await point.
    fn locked<T>(&self, op: impl FnOnce(&mut SqliteStore) -> StorageResult<T>) -> Result<T> {
        let mut store = self.store.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(op(&mut store)?)
    }

    /// Compiles the selector profile matching the URL's host
    fn worker_for(&self, url: &Url) -> Result<ChapterWorker> {
        let profile = self.config.profile_for(url.host_str().unwrap_or_default());
        tracing::debug!("Using selector profile '{}' for {}", profile.name, url);

        Ok(ChapterWorker {
            fetcher: self.fetcher.clone(),
            extractor: Arc::new(Extractor::from_profile(&profile)?),
            sanitizer: Arc::new(Sanitizer::with_patterns(&profile.boilerplate)?),
            max_retries: self.config.crawler.max_retries,
            retry_delay: self.config.crawler.retry_delay(),
        })
    }

    /// Records a new job row in `Pending`
    fn open_job(&self, url: &Url) -> Result<(JobRun, watch::Receiver<JobState>)> {
        let id = self.locked(|store| store.create_job(url.as_str(), &self.config_hash))?;
        let (updates, receiver) = watch::channel(JobState::Pending);
        tracing::info!("Job {} accepted for {}", id, url);
        Ok((
            JobRun {
                id,
                state: JobState::Pending,
                updates,
                novel_key: None,
            },
            receiver,
        ))
    }

    /// Drives a job to a terminal state and persists its outcome
    ///
    /// Catalog and store errors become a `Failed` outcome; only a failure to
    /// record that outcome is returned as an error.
    async fn run_job(
        &self,
        mut job: JobRun,
        url: Url,
        kind: JobKind,
        worker: ChapterWorker,
        cancel: CancellationToken,
    ) -> Result<JobReport> {
        let result = match kind {
            JobKind::Crawl(options) => {
                self.crawl_catalog(&mut job, &url, options, &worker, &cancel)
                    .await
            }
            JobKind::Retry { novel_key } => {
                self.retry_chapters(&mut job, &novel_key, &worker, &cancel)
                    .await
            }
        };

        let outcome = result.unwrap_or_else(|e| JobOutcome::Failed {
            reason: e.to_string(),
        });

        self.finish(&mut job, &outcome)?;
        log_outcome(job.id, &outcome);

        Ok(JobReport {
            job_id: job.id,
            source_url: url.to_string(),
            novel_key: job.novel_key,
            outcome,
        })
    }

    async fn crawl_catalog(
        &self,
        job: &mut JobRun,
        url: &Url,
        options: CrawlOptions,
        worker: &ChapterWorker,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        self.advance(job, JobState::FetchingCatalog)?;

        let body = self
            .fetcher
            .fetch(url.as_str())
            .await
            .map_err(|source| CrawlError::Fetch {
                url: url.to_string(),
                source,
            })?;
        let catalog = worker
            .extractor
            .extract_catalog(&body, url)
            .map_err(|source| CrawlError::Parse {
                url: url.to_string(),
                source,
            })?;

        let key = catalog.novel_key.clone();
        tracing::info!(
            "Catalog '{}' lists {} chapters (container: {:?})",
            catalog.title,
            catalog.chapters.len(),
            catalog.matched
        );
        self.attach_novel(job, &key)?;

        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled {
                phase: JobState::FetchingCatalog,
            });
        }

        let existing = self.locked(|store| store.find_novel_by_key(&key))?;
        let refreshed = match existing {
            Some(_) if !options.refresh => {
                tracing::info!("Novel '{}' already stored, skipping", key);
                return Ok(JobOutcome::AlreadyExists { novel_key: key });
            }
            Some(_) => {
                self.locked(|store| store.replace_catalog(&key, &catalog.chapters))?;
                tracing::info!("Replaced catalog of '{}'", key);
                true
            }
            None => {
                let novel = NewNovel {
                    key: key.clone(),
                    title: catalog.title.clone(),
                    source_url: url.to_string(),
                };
                let created =
                    self.locked(|store| store.create_novel_with_catalog(&novel, &catalog.chapters));
                match created {
                    Ok(stored) => {
                        tracing::info!("Stored novel '{}' (id {})", stored.key, stored.id)
                    }
                    // Lost the race against a concurrent crawl of the same novel
                    Err(CrawlError::Storage(StorageError::DuplicateKey(_))) => {
                        tracing::info!("Novel '{}' committed concurrently, skipping", key);
                        return Ok(JobOutcome::AlreadyExists { novel_key: key });
                    }
                    Err(e) => return Err(e),
                }
                false
            }
        };

        let wrap: fn(ChapterTally) -> JobOutcome = if refreshed {
            JobOutcome::Refreshed
        } else {
            JobOutcome::Created
        };
        self.fetch_and_commit(job, catalog.chapters, worker, cancel, wrap)
            .await
    }

    async fn retry_chapters(
        &self,
        job: &mut JobRun,
        novel_key: &str,
        worker: &ChapterWorker,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        self.advance(job, JobState::FetchingCatalog)?;
        self.attach_novel(job, novel_key)?;

        let missing = self.locked(|store| store.chapters_missing_content(novel_key))?;
        tracing::info!("{} chapters of '{}' have no content", missing.len(), novel_key);

        self.fetch_and_commit(job, missing, worker, cancel, JobOutcome::Recovered)
            .await
    }

    /// Fans chapters out over the worker pool and commits the successes
    async fn fetch_and_commit(
        &self,
        job: &mut JobRun,
        chapters: Vec<ChapterRef>,
        worker: &ChapterWorker,
        cancel: &CancellationToken,
        wrap: fn(ChapterTally) -> JobOutcome,
    ) -> Result<JobOutcome> {
        if chapters.is_empty() {
            return Ok(wrap(ChapterTally::default()));
        }

        self.advance(job, JobState::FetchingChapters)?;
        let mut results = self.dispatch(&chapters, worker, cancel).await;

        if cancel.is_cancelled() {
            tracing::info!("Job {} cancelled, discarding {} results", job.id, results.len());
            return Ok(JobOutcome::Cancelled {
                phase: JobState::FetchingChapters,
            });
        }

        // Results arrive in completion order; rebuild catalog order
        let mut contents = Vec::new();
        let mut failures = Vec::new();
        for chapter in &chapters {
            let key = chapter.key();
            let result = results.remove(&key).unwrap_or(Err(ChapterError::Aborted));
            match result {
                Ok(text) => contents.push((key, text)),
                Err(error) => {
                    tracing::warn!("Chapter {} ({}) failed: {}", key, chapter.url, error);
                    failures.push(ChapterFailure {
                        key,
                        url: chapter.url.clone(),
                        error,
                    });
                }
            }
        }

        self.advance(job, JobState::Committing)?;
        if !contents.is_empty() {
            let written = self.locked(|store| store.upsert_chapter_content(&contents))?;
            tracing::debug!("Committed {} chapter bodies", written);
        }

        Ok(wrap(ChapterTally {
            discovered: chapters.len() as u64,
            fetched: contents.len() as u64,
            failed: failures.len() as u64,
            failures,
        }))
    }

    /// Runs chapter work with at most `workers` fetches in flight
    ///
    /// Once cancelled, no further chapters are dispatched; in-flight ones
    /// are awaited.
    async fn dispatch(
        &self,
        chapters: &[ChapterRef],
        worker: &ChapterWorker,
        cancel: &CancellationToken,
    ) -> HashMap<ChapterKey, std::result::Result<String, ChapterError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.crawler.workers.max(1)));
        let mut join_set = JoinSet::new();

        for chapter in chapters {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = worker.clone();
            let chapter = chapter.clone();
            join_set.spawn(async move {
                let _permit = permit;
                tracing::debug!("Fetching chapter {}", chapter.url);
                let result = worker.fetch_chapter(&chapter).await;
                (chapter.key(), result)
            });
        }

        let mut results = HashMap::with_capacity(chapters.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, result)) => {
                    results.insert(key, result);
                }
                Err(e) => tracing::error!("Chapter worker aborted: {}", e),
            }
        }
        results
    }

    /// Moves a job to `next`, persisting the state and notifying watchers
    fn advance(&self, job: &mut JobRun, next: JobState) -> Result<()> {
        if !job.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: job.state,
                to: next,
            });
        }
        let id = job.id;
        self.locked(|store| store.update_job_state(id, next, None))?;
        tracing::debug!("Job {}: {} -> {}", id, job.state, next);
        job.state = next;
        job.updates.send_replace(next);
        Ok(())
    }

    fn attach_novel(&self, job: &mut JobRun, novel_key: &str) -> Result<()> {
        let (id, state) = (job.id, job.state);
        self.locked(|store| store.update_job_state(id, state, Some(novel_key)))?;
        job.novel_key = Some(novel_key.to_string());
        Ok(())
    }

    /// Moves a job to its terminal state and records the counts
    fn finish(&self, job: &mut JobRun, outcome: &JobOutcome) -> Result<()> {
        let next = outcome.final_state();
        if !job.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: job.state,
                to: next,
            });
        }
        let reason = match outcome {
            JobOutcome::Failed { reason } => Some(reason.as_str()),
            _ => None,
        };
        let id = job.id;
        self.locked(|store| store.finish_job(id, next, outcome.counts(), reason))?;
        job.state = next;
        job.updates.send_replace(next);
        Ok(())
    }
}

fn log_outcome(job_id: i64, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Created(t) | JobOutcome::Refreshed(t) | JobOutcome::Recovered(t) => {
            tracing::info!(
                "Job {} completed: {} discovered, {} fetched, {} failed",
                job_id,
                t.discovered,
                t.fetched,
                t.failed
            );
        }
        JobOutcome::AlreadyExists { novel_key } => {
            tracing::info!("Job {} completed: '{}' already exists", job_id, novel_key);
        }
        JobOutcome::Failed { reason } => {
            tracing::error!("Job {} failed: {}", job_id, reason);
        }
        JobOutcome::Cancelled { phase } => {
            tracing::info!("Job {} cancelled during {}", job_id, phase);
        }
    }
}
