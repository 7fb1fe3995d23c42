//! Extracción de entidades de consultas en texto libre: bairro, zona (ZOT)
//! y número de artículo, contra un registro canónico cargado desde JSON.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::models::ExtractedQueryEntities;
use crate::normalize::{contains_words, match_key, normalize};

const BUILTIN_NEIGHBORHOODS: &str = include_str!("../data/neighborhoods.json");
const BUILTIN_ZONES: &str = include_str!("../data/zones.json");

/// Fracción mínima de palabras del nombre que deben aparecer en la consulta.
const WORD_OVERLAP_THRESHOLD: f64 = 0.8;

static ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ZOT|ZONA)[\s\-]*(\d{1,2})(?:\.(\d+))?\b").expect("regex de zona válida")
});
static ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ARTIGOS?|ARTS?)\b\.?\s*(?:N[º°O]\.?\s*)?(\d+(?:\s*(?:,|\bE\b)\s*\d+)*)")
        .expect("regex de artículo válida")
});
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("regex de dígitos válida"));

/// Palabras vacías que no aportan como keyword de consulta (normalizadas).
const STOPWORDS: &[&str] = &[
    "QUE", "QUAL", "QUAIS", "COMO", "ONDE", "QUANDO", "QUANTO", "PARA", "POR", "PELO", "PELA",
    "COM", "SEM", "DOS", "DAS", "NOS", "NAS", "UMA", "UNS", "UMAS", "ESTE", "ESTA", "ESSE",
    "ESSA", "ISSO", "ISTO", "SEU", "SUA", "SEUS", "SUAS", "MAIS", "MENOS", "SOBRE", "ENTRE",
    "ATE", "NAO", "SIM", "TEM", "SER", "SAO", "FOI", "HA", "DIZ", "PODE", "DEVE",
];

/// Fila del registro canónico tal como viene en el JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    /// Si falta en el JSON se calcula con `normalize(name)`.
    #[serde(default)]
    pub normalized_key: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    entry: RegistryEntry,
    key: String,
    words: Vec<String>,
    aliases: Vec<String>,
}

/// Registro de solo lectura con las claves de comparación precalculadas.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<CompiledEntry>,
}

impl Registry {
    pub fn from_entries(entries: Vec<RegistryEntry>) -> ConfigResult<Self> {
        let mut compiled = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if match_key(&entry.name).is_empty() {
                return Err(ConfigError::InvalidRegistry {
                    reason: "entrada sin nombre".to_string(),
                });
            }
            if entry.normalized_key.is_empty() {
                entry.normalized_key = normalize(&entry.name);
            }
            let key = match_key(&entry.normalized_key);
            let words = key.split(' ').map(str::to_string).collect();
            let aliases = entry
                .aliases
                .iter()
                .map(|a| match_key(a))
                .filter(|a| !a.is_empty())
                .collect();
            compiled.push(CompiledEntry {
                entry,
                key,
                words,
                aliases,
            });
        }
        Ok(Self { entries: compiled })
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let entries: Vec<RegistryEntry> =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidRegistry {
                reason: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Carga un registro desde un fichero JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer el registro {}", path.display()))?;
        let registry = Self::from_json_str(&json)
            .with_context(|| format!("Registro inválido en {}", path.display()))?;
        Ok(registry)
    }

    pub fn builtin_neighborhoods() -> ConfigResult<Self> {
        Self::from_json_str(BUILTIN_NEIGHBORHOODS)
    }

    pub fn builtin_zones() -> ConfigResult<Self> {
        Self::from_json_str(BUILTIN_ZONES)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().map(|c| &c.entry)
    }

    /// Nombre canónico cuya clave coincide exactamente con `code`.
    fn find_exact(&self, code: &str) -> Option<&str> {
        let key = match_key(code);
        self.entries
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.entry.name.as_str())
    }

    /// Mejor entrada para un texto ya pasado por `match_key`.
    fn best_match(&self, query_key: &str) -> Option<&RegistryEntry> {
        let mut best: Option<(usize, f64, usize)> = None;
        for (position, compiled) in self.entries.iter().enumerate() {
            let exact = contains_words(query_key, &compiled.key)
                || compiled.aliases.iter().any(|a| contains_words(query_key, a));
            let score = if exact {
                1.0
            } else {
                // Cada palabra basta con que aparezca dentro de la consulta,
                // así los plurales y las flexiones también cuentan.
                let found = compiled
                    .words
                    .iter()
                    .filter(|w| query_key.contains(w.as_str()))
                    .count();
                found as f64 / compiled.words.len() as f64
            };
            if score < WORD_OVERLAP_THRESHOLD {
                continue;
            }

            let candidate = (compiled.key.len(), score, position);
            let better = match best {
                None => true,
                // Clave más larga, después mayor puntuación; en empate gana
                // el orden del registro.
                Some((len, best_score, _)) => {
                    candidate.0 > len || (candidate.0 == len && score > best_score)
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        best.map(|(_, _, position)| &self.entries[position].entry)
    }
}

/// Extractor de entidades de consulta. Todas las operaciones son puras y
/// nunca fallan.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    neighborhoods: Registry,
    zones: Registry,
}

impl EntityExtractor {
    pub fn new(neighborhoods: Registry, zones: Registry) -> Self {
        Self {
            neighborhoods,
            zones,
        }
    }

    /// Extractor con los registros incluidos en el binario.
    pub fn builtin() -> ConfigResult<Self> {
        Ok(Self::new(
            Registry::builtin_neighborhoods()?,
            Registry::builtin_zones()?,
        ))
    }

    pub fn neighborhoods(&self) -> &Registry {
        &self.neighborhoods
    }

    pub fn zones(&self) -> &Registry {
        &self.zones
    }

    pub fn extract_neighborhood(&self, query: &str) -> Option<String> {
        let key = match_key(query);
        let found = self.neighborhoods.best_match(&key)?;
        debug!(bairro = %found.name, "Bairro identificado en la consulta");
        Some(found.name.clone())
    }

    /// Código de zona canónico (`ZOT NN`, o `ZOT NN.N` si la subzona existe
    /// en el registro).
    pub fn extract_zone(&self, query: &str) -> Option<String> {
        let normalized = normalize(query);
        let caps = ZONE.captures(&normalized)?;
        let number: u32 = caps[1].parse().ok()?;
        let base = format!("ZOT {number:02}");

        let zone = caps
            .get(2)
            .map(|sub| format!("{base}.{}", sub.as_str()))
            .and_then(|code| self.zones.find_exact(&code).map(str::to_string))
            .unwrap_or(base);
        debug!(%zone, "Zona identificada en la consulta");
        Some(zone)
    }

    pub fn extract_article_number(&self, query: &str) -> Option<u32> {
        self.extract_article_numbers(query).into_iter().next()
    }

    /// Todos los números de artículo citados, en orden de aparición y sin
    /// repetidos.
    pub fn extract_article_numbers(&self, query: &str) -> Vec<u32> {
        article_numbers(query)
    }

    /// Palabras de la consulta normalizadas, de más de dos caracteres y sin
    /// palabras vacías.
    pub fn keywords(&self, query: &str) -> BTreeSet<String> {
        match_key(query)
            .split(' ')
            .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
            .map(str::to_string)
            .collect()
    }

    pub fn extract(&self, query: &str) -> ExtractedQueryEntities {
        ExtractedQueryEntities {
            neighborhood: self.extract_neighborhood(query),
            zone: self.extract_zone(query),
            article_number: self.extract_article_number(query),
            keywords: self.keywords(query),
        }
    }
}

/// Números de artículo citados en un texto. No depende de ningún registro,
/// así que el motor de ranking la usa directamente.
pub fn article_numbers(query: &str) -> Vec<u32> {
    let normalized = normalize(query);
    let mut numbers = Vec::new();
    for caps in ARTICLE.captures_iter(&normalized) {
        for digits in DIGITS.find_iter(&caps[1]) {
            if let Ok(n) = digits.as_str().parse::<u32>() {
                if !numbers.contains(&n) {
                    numbers.push(n);
                }
            }
        }
    }
    numbers
}
