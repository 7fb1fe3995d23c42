//! Motor de puntuación contextual.
//!
//! Reordena un pool de candidatos de similitud aplicando, por candidato, la
//! primera regla de boost que se cumpla (tabla ordenada `BOOST_RULES`). Es
//! determinista y sin efectos secundarios: mismas entradas, mismo orden.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::article_numbers;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{BoostKind, CandidateRecord, NodeType, ScoredCandidate};

/// Límite absoluto del pool en modo `speed`.
const SPEED_POOL_CAP: usize = 50;
/// Fracción del umbral de calidad exigida para entrar en el pool.
const POOL_THRESHOLD_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Speed,
    #[default]
    Balanced,
    Quality,
}

impl PerformanceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceMode::Speed => "speed",
            PerformanceMode::Balanced => "balanced",
            PerformanceMode::Quality => "quality",
        }
    }

    pub fn profile(self) -> ModeProfile {
        match self {
            PerformanceMode::Speed => ModeProfile {
                mode: self,
                quality_threshold: 0.2,
                boost_multiplier: 1.0,
            },
            PerformanceMode::Balanced => ModeProfile {
                mode: self,
                quality_threshold: 0.3,
                boost_multiplier: 1.2,
            },
            PerformanceMode::Quality => ModeProfile {
                mode: self,
                quality_threshold: 0.4,
                boost_multiplier: 1.5,
            },
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "speed" => Ok(Self::Speed),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Parámetros de un modo de rendimiento.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    pub mode: PerformanceMode,
    pub quality_threshold: f64,
    pub boost_multiplier: f64,
}

impl ModeProfile {
    /// Tamaño del pool para `requested` resultados pedidos.
    pub fn effective_limit(&self, requested: usize) -> usize {
        match self.mode {
            // requested × 1.5 redondeado hacia arriba en .5
            PerformanceMode::Speed => {
                (requested.saturating_mul(3).saturating_add(1) / 2).min(SPEED_POOL_CAP)
            }
            PerformanceMode::Balanced => requested.saturating_mul(2),
            PerformanceMode::Quality => requested.saturating_mul(3),
        }
    }

    pub fn pool_threshold(&self) -> f64 {
        self.quality_threshold * POOL_THRESHOLD_FACTOR
    }
}

/// Artículo con tratamiento especial cuando la consulta menciona su tema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialArticle {
    pub article_number: u32,
    pub topic_pattern: String,
}

/// Configuración de las reglas de boost. Los patrones se evalúan sin
/// distinguir mayúsculas sobre el texto de la consulta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub special_articles: Vec<SpecialArticle>,
    pub certification_pattern: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            special_articles: vec![SpecialArticle {
                article_number: 74,
                topic_pattern: r"4\s*[oº°]?\s*distrito|quarto\s*distrito".to_string(),
            }],
            certification_pattern: r"certifica[çc][aã]o|sustentabilidade|ambiental".to_string(),
        }
    }
}

impl ScoringConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Hechos de la consulta que consultan los predicados de las reglas.
/// Se calculan una sola vez por llamada a `rank`.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    /// Artículos especiales cuyo tema aparece en la consulta.
    pub special_topics: Vec<u32>,
    pub certification_query: bool,
    pub referenced_articles: Vec<u32>,
}

/// Fila de la tabla de reglas: se aplica la primera cuyo predicado se cumpla.
#[derive(Clone, Copy)]
pub struct BoostRule {
    pub kind: BoostKind,
    pub factor: f64,
    pub applies: fn(&RuleContext, &CandidateRecord) -> bool,
}

impl fmt::Debug for BoostRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoostRule")
            .field("kind", &self.kind)
            .field("factor", &self.factor)
            .finish()
    }
}

impl BoostRule {
    pub fn score(&self, base_similarity: f64, multiplier: f64) -> f64 {
        base_similarity * self.factor * multiplier
    }
}

fn special_zone_rule(ctx: &RuleContext, candidate: &CandidateRecord) -> bool {
    let meta = &candidate.chunk_metadata;
    meta.is_special_zone
        && meta
            .article_number
            .is_some_and(|n| ctx.special_topics.contains(&n))
}

fn certification_rule(ctx: &RuleContext, candidate: &CandidateRecord) -> bool {
    candidate.chunk_metadata.is_certification && ctx.certification_query
}

fn article_reference_rule(ctx: &RuleContext, candidate: &CandidateRecord) -> bool {
    candidate
        .chunk_metadata
        .article_number
        .is_some_and(|n| ctx.referenced_articles.contains(&n))
}

fn important_keywords_rule(_ctx: &RuleContext, candidate: &CandidateRecord) -> bool {
    candidate.chunk_metadata.has_important_keywords
}

pub static BOOST_RULES: [BoostRule; 4] = [
    BoostRule {
        kind: BoostKind::SpecialZone,
        factor: 2.5,
        applies: special_zone_rule,
    },
    BoostRule {
        kind: BoostKind::Certification,
        factor: 2.0,
        applies: certification_rule,
    },
    BoostRule {
        kind: BoostKind::ArticleReference,
        factor: 1.8,
        applies: article_reference_rule,
    },
    BoostRule {
        kind: BoostKind::ImportantKeywords,
        factor: 1.3,
        applies: important_keywords_rule,
    },
];

/// Métricas de una llamada a `rank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankMetrics {
    pub mode: PerformanceMode,
    pub requested: usize,
    pub input_count: usize,
    pub pool_size: usize,
    pub survivors: usize,
    pub returned: usize,
    pub quality_threshold: f64,
    pub elapsed_micros: u64,
    pub boost_applied: bool,
    pub rule_hits: BTreeMap<BoostKind, usize>,
    pub deadline_exceeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub results: Vec<ScoredCandidate>,
    pub metrics: RankMetrics,
}

/// Cualquier cosa capaz de ordenar candidatos. La caché compone sobre este
/// trait, así que en tests se sustituye por un stub que cuenta llamadas.
pub trait Ranker: Send + Sync {
    fn rank(
        &self,
        query: &str,
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
    ) -> ConfigResult<RankedResult>;
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    special_articles: Vec<(u32, Regex)>,
    certification: Regex,
}

fn compile(pattern: &str) -> ConfigResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig) -> ConfigResult<Self> {
        let special_articles = config
            .special_articles
            .iter()
            .map(|s| Ok((s.article_number, compile(&s.topic_pattern)?)))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self {
            special_articles,
            certification: compile(&config.certification_pattern)?,
        })
    }

    /// La tabla de reglas en orden de prioridad.
    pub fn rules(&self) -> &'static [BoostRule] {
        &BOOST_RULES
    }

    pub fn context(&self, query: &str) -> RuleContext {
        RuleContext {
            special_topics: self
                .special_articles
                .iter()
                .filter(|(_, topic)| topic.is_match(query))
                .map(|(n, _)| *n)
                .collect(),
            certification_query: self.certification.is_match(query),
            referenced_articles: article_numbers(query),
        }
    }

    /// Puntuación de un candidato y la regla que la decidió, si alguna.
    pub fn score(
        &self,
        ctx: &RuleContext,
        candidate: &CandidateRecord,
        profile: &ModeProfile,
    ) -> (f64, Option<BoostKind>) {
        let base = candidate.base_similarity;
        let (score, kind) = BOOST_RULES
            .iter()
            .find(|rule| (rule.applies)(ctx, candidate))
            .map(|rule| (rule.score(base, profile.boost_multiplier), Some(rule.kind)))
            .unwrap_or((base, None));
        (score.min(1.0), kind)
    }

    pub fn rank_with_deadline(
        &self,
        query: &str,
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
        deadline: Option<Instant>,
    ) -> ConfigResult<RankedResult> {
        if limit == 0 {
            return Err(ConfigError::NonPositiveLimit);
        }
        let started = Instant::now();
        let profile = mode.profile();
        let ctx = self.context(query);

        // Pool: candidatos válidos sobre el umbral reducido, los mejores por
        // similitud base. El índice original sirve de último desempate.
        let pool_threshold = profile.pool_threshold();
        let mut pool: Vec<(usize, &CandidateRecord)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.base_similarity.is_finite() && c.base_similarity >= pool_threshold)
            .collect();
        pool.sort_by(|a, b| {
            b.1.base_similarity
                .total_cmp(&a.1.base_similarity)
                .then(a.0.cmp(&b.0))
        });
        pool.truncate(profile.effective_limit(limit));
        let pool_size = pool.len();

        let mut rule_hits: BTreeMap<BoostKind, usize> = BTreeMap::new();
        let mut deadline_exceeded = false;
        let mut scored: Vec<(usize, f64, Option<BoostKind>, &CandidateRecord)> =
            Vec::with_capacity(pool_size);
        for (index, candidate) in pool {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                deadline_exceeded = true;
                break;
            }
            let (score, kind) = self.score(&ctx, candidate, &profile);
            if let Some(kind) = kind {
                *rule_hits.entry(kind).or_insert(0) += 1;
            }
            if score >= profile.quality_threshold {
                scored.push((index, score, kind, candidate));
            }
        }
        let survivors = scored.len();

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| tie_priority(a.3).cmp(&tie_priority(b.3)))
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        let results: Vec<ScoredCandidate> = scored
            .into_iter()
            .enumerate()
            .map(|(position, (_, score, kind, candidate))| ScoredCandidate {
                candidate: candidate.clone(),
                contextual_score: score,
                rank: position + 1,
                applied_boost: kind,
            })
            .collect();

        let metrics = RankMetrics {
            mode,
            requested: limit,
            input_count: candidates.len(),
            pool_size,
            survivors,
            returned: results.len(),
            quality_threshold: profile.quality_threshold,
            elapsed_micros: started.elapsed().as_micros() as u64,
            boost_applied: !rule_hits.is_empty(),
            rule_hits,
            deadline_exceeded,
        };
        debug!(
            mode = %mode,
            input = metrics.input_count,
            pool = metrics.pool_size,
            returned = metrics.returned,
            boosted = metrics.boost_applied,
            "Ranking contextual calculado"
        );

        Ok(RankedResult { results, metrics })
    }
}

fn tie_priority(candidate: &CandidateRecord) -> u8 {
    NodeType::tie_priority(candidate.chunk_metadata.node_type)
}

impl Ranker for ScoringEngine {
    fn rank(
        &self,
        query: &str,
        candidates: &[CandidateRecord],
        mode: PerformanceMode,
        limit: usize,
    ) -> ConfigResult<RankedResult> {
        self.rank_with_deadline(query, candidates, mode, limit, None)
    }
}
