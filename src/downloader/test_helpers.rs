//! Shared test helpers for exercising BatchDownloader without a network.

use crate::config::Config;
use crate::downloader::{BatchDownloader, RecordingFetcher};
use crate::error::FetchError;
use crate::resume::{MemoryResumeStore, ResumeStore};
use crate::types::{Event, RecordingId, WorkItem, WorkItemLayout};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted fetcher answers calls for one recording
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Write a file of this many bytes
    Succeed(u64),
    /// Fail every attempt with this error
    Fail(FetchError),
    /// Fail this many times transiently, then write the file
    FailTimes(u32),
    /// Panic inside the task
    Panic,
}

/// In-memory [`RecordingFetcher`] with per-id behavior and concurrency accounting
pub(crate) struct ScriptedFetcher {
    scripts: HashMap<RecordingId, Script>,
    delay: Duration,
    calls: Mutex<Vec<RecordingId>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    /// Every recording succeeds unless scripted otherwise
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            scripts: HashMap::new(),
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn script(mut self, id: i64, script: Script) -> Self {
        self.scripts.insert(RecordingId(id), script);
        self
    }

    /// Ids in the order the fetcher was called (one entry per attempt)
    pub(crate) fn calls(&self) -> Vec<RecordingId> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, id: i64) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == RecordingId(id))
            .count()
    }

    /// Highest number of concurrent `fetch` calls observed
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordingFetcher for ScriptedFetcher {
    async fn fetch(&self, item: &WorkItem, destination: &Path) -> Result<u64, FetchError> {
        let attempt_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(item.id());
            calls.iter().filter(|c| **c == item.id()).count() as u32
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = self
            .scripts
            .get(&item.id())
            .cloned()
            .unwrap_or(Script::Succeed(1024));
        let bytes = match script {
            Script::Succeed(bytes) => bytes,
            Script::Fail(err) => return Err(err),
            Script::FailTimes(n) if attempt_index <= n => {
                return Err(FetchError::Transient(format!("flaky attempt {attempt_index}")));
            }
            Script::FailTimes(_) => 2048,
            Script::Panic => panic!("fetcher exploded on {}", item.id()),
        };

        tokio::fs::write(destination, vec![0u8; bytes as usize])
            .await
            .map_err(|e| FetchError::from_io(&e))?;
        Ok(bytes)
    }
}

/// Config tuned for fast tests, writing into `dir`
pub(crate) fn test_config(dir: &Path, concurrency: usize, max_retries: u32) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.to_path_buf();
    config.download.concurrency = concurrency;
    config.download.launch_interval = Duration::from_millis(5);
    config.retry.max_retries = max_retries;
    config.retry.retry_delay = Duration::from_millis(5);
    config
}

/// Work items for `ids`, one minute apart, in the given order
pub(crate) fn work_items(dir: &Path, ids: &[i64]) -> Vec<WorkItem> {
    let layout = WorkItemLayout {
        output_dir: dir.to_path_buf(),
        extension: "mp4".to_string(),
    };
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            WorkItem::new(
                RecordingId(*id),
                base + chrono::Duration::minutes(i as i64),
                "motion",
                &layout,
            )
        })
        .collect()
}

/// Build a downloader over a scripted fetcher and a fresh in-memory marker store
pub(crate) fn create_test_downloader(
    config: Config,
    fetcher: Arc<ScriptedFetcher>,
) -> (BatchDownloader, Arc<MemoryResumeStore>) {
    let store = Arc::new(MemoryResumeStore::default());
    let downloader = BatchDownloader::new(
        config,
        fetcher as Arc<dyn RecordingFetcher>,
        Arc::clone(&store) as Arc<dyn ResumeStore>,
    )
    .unwrap();
    (downloader, store)
}

/// Drain every event currently buffered in `rx`
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
