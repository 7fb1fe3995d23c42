//! Caché de resultados de ranking.
//!
//! La clave es un hash blake3 de (consulta normalizada, documentos del
//! corpus, candidatos, modo, límite). El almacén es un trait (`ResultStore`) con una
//! implementación en memoria sobre moka; `CachedRanker` lo compone con
//! cualquier `Ranker` y falla en abierto: si el almacén no responde, se
//! calcula directamente.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheResult, ConfigResult};
use crate::models::{CandidateRecord, ScoredCandidate};
use crate::normalize::normalize;
use crate::scoring::{PerformanceMode, RankMetrics, Ranker};

/// Huella estable de una petición de ranking (hex de blake3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        query: &str,
        document_ids: &[String],
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
    ) -> Self {
        let mut ids: Vec<&str> = document_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize(query).as_bytes());
        hasher.update(b"\x1f");
        for id in ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\x1e");
        }
        hasher.update(b"\x1f");
        // Los candidatos entran en orden: el orden decide los empates.
        for candidate in candidates {
            hash_candidate(&mut hasher, candidate);
            hasher.update(b"\x1e");
        }
        hasher.update(b"\x1f");
        hasher.update(mode.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(&(limit as u64).to_le_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn hash_candidate(hasher: &mut blake3::Hasher, candidate: &CandidateRecord) {
    let meta = &candidate.chunk_metadata;
    let article = meta.article_number.map(|n| n.to_string());

    hash_field(hasher, candidate.id.as_deref());
    hash_field(hasher, Some(candidate.content.as_str()));
    hasher.update(&candidate.base_similarity.to_bits().to_le_bytes());
    hasher.update(&[
        meta.is_special_zone as u8,
        meta.is_certification as u8,
        meta.has_important_keywords as u8,
    ]);
    hash_field(hasher, article.as_deref());
    hash_field(hasher, meta.node_type.map(|t| t.label()));
    hash_field(hasher, meta.document_type.as_deref());
}

fn hash_field(hasher: &mut blake3::Hasher, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(&(v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
}

/// Copia de una entrada tal como la devuelve el almacén.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Vec<ScoredCandidate>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub ttl: Duration,
}

/// Backend de la caché. Las implementaciones duraderas se enchufan aquí.
pub trait ResultStore: Send + Sync {
    /// Entrada vigente para `key`. Un acierto actualiza `last_accessed` y
    /// `access_count`; una entrada caducada es un fallo.
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>>;

    fn put(&self, key: CacheKey, payload: Vec<ScoredCandidate>, ttl: Duration) -> CacheResult<()>;

    /// Purga de entradas caducadas.
    fn sweep(&self) -> CacheResult<()>;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct StoredEntry {
    payload: Vec<ScoredCandidate>,
    created_at: DateTime<Utc>,
    inserted: Instant,
    ttl: Duration,
    access_count: AtomicU64,
    last_accessed_ms: AtomicI64,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.inserted.elapsed() >= self.ttl
    }

    fn touch(&self) -> (u64, DateTime<Utc>) {
        let now = Utc::now();
        self.last_accessed_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
        let count = self.access_count.fetch_add(1, Ordering::Relaxed) + 1;
        (count, now)
    }
}

/// TTL por entrada: cada valor lleva el suyo.
struct EntryExpiry;

impl Expiry<CacheKey, Arc<StoredEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Arc<StoredEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Almacén en memoria: moka con TTL por entrada y expulsión LRU bajo
/// presión de capacidad.
pub struct MemoryStore {
    cache: Cache<CacheKey, Arc<StoredEntry>>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let Some(stored) = self.cache.get(key) else {
            return Ok(None);
        };
        if stored.is_expired() {
            self.cache.invalidate(key);
            return Ok(None);
        }

        let (access_count, last_accessed) = stored.touch();
        Ok(Some(CacheEntry {
            key: key.clone(),
            payload: stored.payload.clone(),
            created_at: stored.created_at,
            last_accessed,
            access_count,
            ttl: stored.ttl,
        }))
    }

    fn put(&self, key: CacheKey, payload: Vec<ScoredCandidate>, ttl: Duration) -> CacheResult<()> {
        let now = Utc::now();
        let entry = StoredEntry {
            payload,
            created_at: now,
            inserted: Instant::now(),
            ttl,
            access_count: AtomicU64::new(0),
            last_accessed_ms: AtomicI64::new(now.timestamp_millis()),
        };
        self.cache.insert(key, Arc::new(entry));
        Ok(())
    }

    fn sweep(&self) -> CacheResult<()> {
        self.cache.run_pending_tasks();
        Ok(())
    }

    fn len(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: u64,
    pub ttl_speed: Duration,
    pub ttl_balanced: Duration,
    pub ttl_quality: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            ttl_speed: Duration::from_secs(15 * 60),
            ttl_balanced: Duration::from_secs(30 * 60),
            ttl_quality: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, mode: PerformanceMode) -> Duration {
        match mode {
            PerformanceMode::Speed => self.ttl_speed,
            PerformanceMode::Balanced => self.ttl_balanced,
            PerformanceMode::Quality => self.ttl_quality,
        }
    }
}

/// Origen de una respuesta de `CachedRanker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
    /// El almacén falló y se calculó directamente.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRanking {
    pub results: Vec<ScoredCandidate>,
    /// Sólo presente cuando el ranking se calculó en esta llamada.
    pub metrics: Option<RankMetrics>,
    pub cache: CacheStatus,
    pub key: CacheKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub errors: u64,
    pub entries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    errors: AtomicU64,
}

/// `Ranker` envuelto con la caché de resultados.
pub struct CachedRanker<R: Ranker> {
    ranker: R,
    store: Arc<dyn ResultStore>,
    config: CacheConfig,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    counters: Counters,
}

impl<R: Ranker> CachedRanker<R> {
    pub fn new(ranker: R, store: Arc<dyn ResultStore>, config: CacheConfig) -> Self {
        Self {
            ranker,
            store,
            config,
            in_flight: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Con el almacén en memoria por defecto.
    pub fn in_memory(ranker: R, config: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new(config.capacity));
        Self::new(ranker, store, config)
    }

    pub fn ranker(&self) -> &R {
        &self.ranker
    }

    pub fn store(&self) -> Arc<dyn ResultStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }

    pub fn rank(
        &self,
        query: &str,
        document_ids: &[String],
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
        bypass: bool,
    ) -> ConfigResult<CachedRanking> {
        let key = CacheKey::new(query, document_ids, candidates, mode, limit);

        if bypass {
            self.counters.bypasses.fetch_add(1, Ordering::Relaxed);
            return self.compute(key, query, candidates, mode, limit, CacheStatus::Bypass);
        }

        match self.lookup(&key) {
            Ok(Some(entry)) => return Ok(self.hit(key, entry)),
            Ok(None) => {}
            Err(()) => {
                return self.compute(key, query, candidates, mode, limit, CacheStatus::Unavailable)
            }
        }

        // Fallos concurrentes sobre la misma clave esperan a un único cálculo.
        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let outcome = match self.lookup(&key) {
            Ok(Some(entry)) => Ok(self.hit(key.clone(), entry)),
            Ok(None) => self
                .compute(key.clone(), query, candidates, mode, limit, CacheStatus::Miss)
                .inspect(|ranking| {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    let ttl = self.config.ttl_for(mode);
                    if let Err(e) = self.store.put(key.clone(), ranking.results.clone(), ttl) {
                        self.counters.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "No se pudo guardar el resultado en la caché");
                    }
                }),
            Err(()) => self.compute(key.clone(), query, candidates, mode, limit, CacheStatus::Unavailable),
        };

        drop(guard);
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &lock));
        outcome
    }

    /// `Err(())` cuando el almacén falla; el error ya queda registrado.
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, ()> {
        self.store.get(key).map_err(|e| {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Caché no disponible, se calcula el ranking directamente");
        })
    }

    fn hit(&self, key: CacheKey, entry: CacheEntry) -> CachedRanking {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.as_str(), accesses = entry.access_count, "Acierto de caché");
        CachedRanking {
            results: entry.payload,
            metrics: None,
            cache: CacheStatus::Hit,
            key,
        }
    }

    fn compute(
        &self,
        key: CacheKey,
        query: &str,
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
        status: CacheStatus,
    ) -> ConfigResult<CachedRanking> {
        let ranked = self.ranker.rank(query, candidates, mode, limit)?;
        Ok(CachedRanking {
            results: ranked.results,
            metrics: Some(ranked.metrics),
            cache: status,
            key,
        })
    }
}

/// Purga periódica de entradas caducadas en segundo plano.
pub fn spawn_sweeper(
    store: Arc<dyn ResultStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match store.sweep() {
                Ok(()) => debug!(entries = store.len(), "Barrido de caché completado"),
                Err(e) => warn!(error = %e, "Fallo en el barrido de caché"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;
    use crate::error::{CacheError, ConfigError};
    use crate::models::ChunkMetadata;
    use crate::scoring::{RankedResult, ScoringConfig, ScoringEngine};

    /// Ranker real que además cuenta cuántas veces se le invoca.
    struct CountingRanker {
        engine: ScoringEngine,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingRanker {
        fn new() -> Self {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                engine: ScoringEngine::new(&ScoringConfig::default()).unwrap(),
                calls: AtomicUsize::new(0),
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Ranker for CountingRanker {
        fn rank(
            &self,
            query: &str,
            candidates: &[CandidateRecord],
            mode: PerformanceMode,
            limit: usize,
        ) -> ConfigResult<RankedResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.engine.rank(query, candidates, mode, limit)
        }
    }

    struct FailingStore;

    impl ResultStore for FailingStore {
        fn get(&self, _key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
            Err(CacheError::Unavailable { reason: "sin conexión".to_string() })
        }

        fn put(&self, _key: CacheKey, _payload: Vec<ScoredCandidate>, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Unavailable { reason: "sin conexión".to_string() })
        }

        fn sweep(&self) -> CacheResult<()> {
            Ok(())
        }

        fn len(&self) -> u64 {
            0
        }
    }

    fn candidates() -> Vec<CandidateRecord> {
        vec![
            CandidateRecord {
                id: Some("luos:1".to_string()),
                content: "Art. 81 altura máxima".to_string(),
                chunk_metadata: ChunkMetadata { article_number: Some(81), ..Default::default() },
                base_similarity: 0.5,
            },
            CandidateRecord {
                id: Some("luos:2".to_string()),
                content: "Art. 80 recuos".to_string(),
                chunk_metadata: ChunkMetadata { article_number: Some(80), ..Default::default() },
                base_similarity: 0.6,
            },
        ]
    }

    fn docs() -> Vec<String> {
        vec!["LUOS@g1".to_string(), "PDUS@g1".to_string()]
    }

    #[test]
    fn key_is_stable_across_spelling_and_id_order() {
        let a = CacheKey::new("Altura  em Petrópolis", &docs(), &candidates(), PerformanceMode::Speed, 5);
        let reversed = vec!["PDUS@g1".to_string(), "LUOS@g1".to_string(), "LUOS@g1".to_string()];
        let b = CacheKey::new("altura em petropolis", &reversed, &candidates(), PerformanceMode::Speed, 5);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new("altura em petropolis", &docs(), &candidates(), PerformanceMode::Quality, 5));
        assert_ne!(a, CacheKey::new("altura em petropolis", &docs(), &candidates(), PerformanceMode::Speed, 6));
        assert_ne!(a, CacheKey::new("altura em petropolis", &["LUOS@g2".to_string()], &candidates(), PerformanceMode::Speed, 5));
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let cached = CachedRanker::in_memory(CountingRanker::new(), CacheConfig::default());
        let first = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Balanced, 2, false)
            .unwrap();
        let second = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Balanced, 2, false)
            .unwrap();

        assert_eq!(cached.ranker().calls(), 1);
        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(first.results, second.results);
        assert!(second.metrics.is_none());
        assert_eq!(cached.stats().hits, 1);
        assert_eq!(cached.stats().misses, 1);
    }

    #[test]
    fn different_candidates_do_not_share_an_entry() {
        let cached = CachedRanker::in_memory(CountingRanker::new(), CacheConfig::default());
        let candidate = |id: &str| CandidateRecord {
            id: Some(id.to_string()),
            content: format!("Texto {id}"),
            chunk_metadata: ChunkMetadata::default(),
            base_similarity: 0.9,
        };

        let first = cached
            .rank("altura", &[], &[candidate("A")], PerformanceMode::Balanced, 5, false)
            .unwrap();
        let second = cached
            .rank("altura", &[], &[candidate("B")], PerformanceMode::Balanced, 5, false)
            .unwrap();

        assert_eq!(second.cache, CacheStatus::Miss);
        assert_ne!(first.key, second.key);
        let ids: Vec<_> = second.results.iter().map(|r| r.candidate.id.clone()).collect();
        assert_eq!(ids, vec![Some("B".to_string())]);
        assert_eq!(cached.ranker().calls(), 2);

        let mut reordered = candidates();
        reordered.reverse();
        assert_ne!(
            CacheKey::new("q", &docs(), &candidates(), PerformanceMode::Speed, 5),
            CacheKey::new("q", &docs(), &reordered, PerformanceMode::Speed, 5),
        );
    }

    #[test]
    fn expired_entry_recomputes() {
        let config = CacheConfig {
            ttl_balanced: Duration::from_millis(40),
            ..Default::default()
        };
        let cached = CachedRanker::in_memory(CountingRanker::new(), config);
        let rank = || {
            cached
                .rank("art. 81", &docs(), &candidates(), PerformanceMode::Balanced, 2, false)
                .unwrap()
        };

        rank();
        assert_eq!(rank().cache, CacheStatus::Hit);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(rank().cache, CacheStatus::Miss);
        assert_eq!(cached.ranker().calls(), 2);
    }

    #[test]
    fn bypass_recomputes_and_leaves_cache_untouched() {
        let cached = CachedRanker::in_memory(CountingRanker::new(), CacheConfig::default());
        let bypassed = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Speed, 2, true)
            .unwrap();
        assert_eq!(bypassed.cache, CacheStatus::Bypass);
        cached.store().sweep().unwrap();
        assert!(cached.store().is_empty());

        let next = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Speed, 2, false)
            .unwrap();
        assert_eq!(next.cache, CacheStatus::Miss);
        assert_eq!(cached.ranker().calls(), 2);
        assert_eq!(cached.stats().bypasses, 1);
    }

    #[test]
    fn failing_store_fails_open() {
        let engine = ScoringEngine::new(&ScoringConfig::default()).unwrap();
        let direct = engine
            .rank("art. 81", &candidates(), PerformanceMode::Quality, 2)
            .unwrap();

        let cached = CachedRanker::new(CountingRanker::new(), Arc::new(FailingStore), CacheConfig::default());
        let first = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Quality, 2, false)
            .unwrap();
        let second = cached
            .rank("art. 81", &docs(), &candidates(), PerformanceMode::Quality, 2, false)
            .unwrap();

        assert_eq!(first.results, direct.results);
        assert_eq!(second.results, direct.results);
        assert_eq!(first.cache, CacheStatus::Unavailable);
        assert_eq!(cached.ranker().calls(), 2);
        assert_eq!(cached.stats().errors, 2);
    }

    #[test]
    fn config_errors_are_not_cached() {
        let cached = CachedRanker::in_memory(CountingRanker::new(), CacheConfig::default());
        let result = cached.rank("x", &docs(), &candidates(), PerformanceMode::Speed, 0, false);
        assert_eq!(result, Err(ConfigError::NonPositiveLimit));
        cached.store().sweep().unwrap();
        assert!(cached.store().is_empty());
    }

    #[test]
    fn hits_update_access_counters() {
        let store = MemoryStore::new(10);
        let key = CacheKey::new("q", &docs(), &[], PerformanceMode::Speed, 1);
        store.put(key.clone(), Vec::new(), Duration::from_secs(60)).unwrap();

        let first = store.get(&key).unwrap().unwrap();
        let second = store.get(&key).unwrap().unwrap();
        assert_eq!(first.access_count, 1);
        assert_eq!(second.access_count, 2);
        assert!(second.last_accessed >= first.last_accessed);
        assert!(second.last_accessed >= second.created_at);
    }

    #[test]
    fn capacity_bound_evicts() {
        let store = MemoryStore::new(2);
        for i in 0..5 {
            let key = CacheKey::new(&format!("q{i}"), &docs(), &[], PerformanceMode::Speed, 1);
            store.put(key, Vec::new(), Duration::from_secs(60)).unwrap();
        }
        store.sweep().unwrap();
        assert!(store.len() <= 2);
    }

    #[test]
    fn concurrent_misses_compute_once() {
        let cached = CachedRanker::in_memory(
            CountingRanker::with_delay(Duration::from_millis(50)),
            CacheConfig::default(),
        );
        let pool = candidates();
        let ids = docs();

        let results: Vec<CachedRanking> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cached
                            .rank("art. 81", &ids, &pool, PerformanceMode::Balanced, 2, false)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cached.ranker().calls(), 1);
        assert_eq!(results.iter().filter(|r| r.cache == CacheStatus::Miss).count(), 1);
        assert!(results.windows(2).all(|w| w[0].results == w[1].results));
    }

    #[tokio::test]
    async fn sweeper_runs_in_background() {
        let store: Arc<dyn ResultStore> = Arc::new(MemoryStore::new(10));
        let key = CacheKey::new("q", &docs(), &[], PerformanceMode::Speed, 1);
        store.put(key.clone(), Vec::new(), Duration::from_millis(10)).unwrap();

        let handle = spawn_sweeper(Arc::clone(&store), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert!(store.get(&key).unwrap().is_none());
        assert_eq!(store.len(), 0);
    }
}
