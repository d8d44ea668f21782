//! Exam history: a bounded, most-recent-first list of past exams.
//!
//! Storage is behind `HistoryStore` (`load` / `save`), a dumb
//! overwrite-the-whole-list store. Capping, ordering and serializing the
//! read-modify-write cycles live in `ExamHistory`, shared by every caller.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::Exam;
use crate::error::HistoryError;

pub const HISTORY_CAPACITY: usize = 10;

#[async_trait]
pub trait HistoryStore: Send + Sync {
  /// Stored exams, newest first. Missing or corrupt data yields an empty list;
  /// data that exists but cannot be read right now is an error.
  async fn load(&self) -> Result<Vec<Exam>, HistoryError>;

  /// Replace the stored list.
  async fn save(&self, exams: &[Exam]) -> Result<(), HistoryError>;
}

/// History operations over a store. Mutations hold one lock from load to save.
pub struct ExamHistory {
  store: Arc<dyn HistoryStore>,
  write_lock: Mutex<()>,
}

impl ExamHistory {
  pub fn new(store: Arc<dyn HistoryStore>) -> Self {
    Self { store, write_lock: Mutex::new(()) }
  }

  /// For display. An unreadable store shows as empty and is left as is.
  pub async fn list(&self) -> Vec<Exam> {
    match self.store.load().await {
      Ok(exams) => exams,
      Err(e) => {
        warn!(target: "history", error = %e, "Exam history unavailable; showing it as empty");
        vec![]
      }
    }
  }

  pub async fn find(&self, id: &str) -> Option<Exam> {
    self.list().await.into_iter().find(|e| e.id == id)
  }

  /// Prepend `exam`, drop anything beyond capacity, persist. Returns the new list.
  /// Nothing is written when the current list cannot be read.
  #[instrument(level = "debug", skip(self, exam), fields(exam_id = %exam.id))]
  pub async fn record(&self, exam: Exam) -> Result<Vec<Exam>, HistoryError> {
    let _guard = self.write_lock.lock().await;
    let mut exams = self.store.load().await?;
    exams.retain(|e| e.id != exam.id);
    exams.insert(0, exam);
    exams.truncate(HISTORY_CAPACITY);
    self.store.save(&exams).await?;
    Ok(exams)
  }

  pub async fn clear(&self) -> Result<(), HistoryError> {
    let _guard = self.write_lock.lock().await;
    self.store.save(&[]).await
  }
}

/// JSON array on disk. Corrupt files are discarded wholesale and removed.
pub struct JsonFileHistory {
  path: PathBuf,
  // Serializes file access.
  lock: Mutex<()>,
}

impl JsonFileHistory {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), lock: Mutex::new(()) }
  }

  fn io_err(&self, source: std::io::Error) -> HistoryError {
    HistoryError::Io { path: self.path.clone(), source }
  }
}

#[async_trait]
impl HistoryStore for JsonFileHistory {
  async fn load(&self) -> Result<Vec<Exam>, HistoryError> {
    let _guard = self.lock.lock().await;
    let raw = match tokio::fs::read(&self.path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
      Err(e) => return Err(self.io_err(e)),
    };
    match serde_json::from_slice::<Vec<Exam>>(&raw) {
      Ok(exams) => {
        debug!(target: "history", count = exams.len(), "Loaded exam history");
        Ok(exams)
      }
      Err(e) => {
        warn!(target: "history", path = %self.path.display(), error = %e, "Exam history is corrupt; discarding it");
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
          warn!(target: "history", error = %e, "Failed to remove corrupt exam history");
        }
        Ok(vec![])
      }
    }
  }

  async fn save(&self, exams: &[Exam]) -> Result<(), HistoryError> {
    let _guard = self.lock.lock().await;
    let json = serde_json::to_vec_pretty(exams)?;
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_err(e))?;
    }
    // Write-then-rename so a crash never leaves a half-written file behind.
    let tmp = self.path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(|e| self.io_err(e))?;
    tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_err(e))?;
    debug!(target: "history", count = exams.len(), "Saved exam history");
    Ok(())
  }
}

/// Process-local store; used when no file should be touched and in tests.
#[derive(Default)]
pub struct MemoryHistory {
  exams: Mutex<Vec<Exam>>,
}

#[async_trait]
impl HistoryStore for MemoryHistory {
  async fn load(&self) -> Result<Vec<Exam>, HistoryError> { Ok(self.exams.lock().await.clone()) }

  async fn save(&self, exams: &[Exam]) -> Result<(), HistoryError> {
    *self.exams.lock().await = exams.to_vec();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::time::Duration as StdDuration;

  use chrono::{Duration, TimeZone, Utc};
  use tokio::sync::Notify;

  use crate::domain::{Question, QuestionType};

  fn exam(i: usize) -> Exam {
    Exam {
      id: format!("exam_{i}"),
      title: format!("Exam {i}"),
      created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i as i64),
      questions: vec![Question {
        question_number: 1,
        question_text: "Define osmosis.".into(),
        question_type: QuestionType::ShortAnswer,
        options: None,
        correct_answer: "Diffusion of water across a membrane.".into(),
      }],
    }
  }

  fn in_memory() -> (ExamHistory, Arc<MemoryHistory>) {
    let store = Arc::new(MemoryHistory::default());
    (ExamHistory::new(store.clone()), store)
  }

  #[tokio::test]
  async fn file_round_trip_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileHistory::new(dir.path().join("nested").join("history.json"));
    assert!(store.load().await.unwrap().is_empty());

    let exams: Vec<Exam> = (0..4).rev().map(exam).collect();
    store.save(&exams).await.unwrap();
    assert_eq!(store.load().await.unwrap(), exams);
  }

  #[tokio::test]
  async fn record_keeps_ten_most_recent_first() {
    let (history, _) = in_memory();
    for i in 0..11 {
      history.record(exam(i)).await.unwrap();
    }
    let ids: Vec<String> = history.list().await.into_iter().map(|e| e.id).collect();
    let expected: Vec<String> = (1..11).rev().map(|i| format!("exam_{i}")).collect();
    assert_eq!(ids, expected);
  }

  #[tokio::test]
  async fn corrupt_file_is_discarded_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "[{\"id\": \"exam_1\", \"title\": ").unwrap();

    let store = Arc::new(JsonFileHistory::new(&path));
    assert!(store.load().await.unwrap().is_empty());
    assert!(!path.exists());

    let history = ExamHistory::new(store);
    history.record(exam(1)).await.unwrap();
    assert_eq!(history.list().await.len(), 1);
  }

  #[tokio::test]
  async fn non_utf8_file_counts_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, [0xffu8, 0xfe, 0x00]).unwrap();

    let store = JsonFileHistory::new(&path);
    assert!(store.load().await.unwrap().is_empty());
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn unreadable_file_is_an_error_not_an_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be: exists, but cannot be read as one.
    let path = dir.path().join("history.json");
    std::fs::create_dir(&path).unwrap();

    let store = JsonFileHistory::new(&path);
    assert!(matches!(store.load().await, Err(HistoryError::Io { .. })));
    assert!(path.is_dir());
  }

  /// Fails every load; remembers whether a save happened.
  #[derive(Default)]
  struct UnreadableStore {
    saved: AtomicBool,
  }

  #[async_trait]
  impl HistoryStore for UnreadableStore {
    async fn load(&self) -> Result<Vec<Exam>, HistoryError> {
      Err(HistoryError::Io {
        path: PathBuf::from("history.json"),
        source: std::io::Error::new(std::io::ErrorKind::Other, "EIO"),
      })
    }

    async fn save(&self, _exams: &[Exam]) -> Result<(), HistoryError> {
      self.saved.store(true, Ordering::SeqCst);
      Ok(())
    }
  }

  #[tokio::test]
  async fn record_does_not_overwrite_when_load_fails() {
    let store = Arc::new(UnreadableStore::default());
    let history = ExamHistory::new(store.clone());

    assert!(history.record(exam(1)).await.is_err());
    assert!(!store.saved.load(Ordering::SeqCst));
    assert!(history.list().await.is_empty());
  }

  #[tokio::test]
  async fn record_over_failed_file_read_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), "stored").unwrap();

    let history = ExamHistory::new(Arc::new(JsonFileHistory::new(&path)));
    assert!(history.record(exam(1)).await.is_err());
    assert_eq!(std::fs::read_to_string(path.join("keep")).unwrap(), "stored");
  }

  /// Parks the first load until released.
  struct SlowFirstLoad {
    inner: MemoryHistory,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
  }

  #[async_trait]
  impl HistoryStore for SlowFirstLoad {
    async fn load(&self) -> Result<Vec<Exam>, HistoryError> {
      if self.gated.swap(false, Ordering::SeqCst) {
        self.entered.notify_one();
        self.release.notified().await;
      }
      self.inner.load().await
    }

    async fn save(&self, exams: &[Exam]) -> Result<(), HistoryError> { self.inner.save(exams).await }
  }

  #[tokio::test]
  async fn clear_waits_for_an_in_flight_record() {
    let store = Arc::new(SlowFirstLoad {
      inner: MemoryHistory::default(),
      gated: AtomicBool::new(true),
      entered: Notify::new(),
      release: Notify::new(),
    });
    let history = Arc::new(ExamHistory::new(store.clone()));

    let recording = {
      let history = history.clone();
      tokio::spawn(async move { history.record(exam(1)).await })
    };
    store.entered.notified().await;

    let clearing = {
      let history = history.clone();
      tokio::spawn(async move { history.clear().await })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert!(!clearing.is_finished());

    store.release.notify_one();
    recording.await.unwrap().unwrap();
    clearing.await.unwrap().unwrap();
    assert!(history.list().await.is_empty());
  }

  #[tokio::test]
  async fn find_and_clear() {
    let (history, store) = in_memory();
    history.record(exam(1)).await.unwrap();
    history.record(exam(2)).await.unwrap();
    assert_eq!(history.find("exam_1").await.map(|e| e.title), Some("Exam 1".to_string()));
    assert!(history.find("exam_9").await.is_none());

    history.clear().await.unwrap();
    assert!(store.load().await.unwrap().is_empty());
  }
}
