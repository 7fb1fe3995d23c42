use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::oneshot;

use crate::cache::CachedRanker;
use crate::config::AppConfig;
use crate::corpus::Corpus;
use crate::entities::EntityExtractor;
use crate::scoring::ScoringEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Generación vigente del corpus. Una ingesta nueva sustituye el `Arc`
    /// completo; las consultas en curso siguen con la generación anterior.
    pub corpus: Arc<RwLock<Arc<Corpus>>>,
    pub extractor: Arc<EntityExtractor>,
    pub ranker: Arc<CachedRanker<ScoringEngine>>,
    pub status: Arc<Mutex<Status>>,
    pub current_dir: Arc<Mutex<Option<PathBuf>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn corpus(&self) -> Arc<Corpus> {
        let guard = self.corpus.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace_corpus(&self, corpus: Corpus) {
        let mut guard = self.corpus.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(corpus);
    }

    pub fn status(&self) -> MutexGuard<'_, Status> {
        lock_status(&self.status)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

/// Bloquea el estado aunque el mutex haya quedado envenenado.
pub fn lock_status(status: &Mutex<Status>) -> MutexGuard<'_, Status> {
    status.lock().unwrap_or_else(|p| p.into_inner())
}
