//! Carga y gestión de configuración de la aplicación (parser, registros,
//! ranking y caché).

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::cache::CacheConfig;
use crate::parser::{DuplicatePolicy, ParserConfig};
use crate::scoring::ScoringConfig;

const DEFAULT_EXPECTED_ARTICLES: &str = "PDUS=217,LUOS=121";

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    /// Directorio que se ingiere al arrancar, si está definido.
    pub corpus_dir: Option<PathBuf>,
    pub neighborhoods_path: Option<PathBuf>,
    pub zones_path: Option<PathBuf>,
    pub scoring_config_path: Option<PathBuf>,
    pub parser: ParserConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let expected = env::var("EXPECTED_ARTICLES")
            .unwrap_or_else(|_| DEFAULT_EXPECTED_ARTICLES.to_string());
        let duplicate_policy: DuplicatePolicy = match env::var("DUPLICATE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => DuplicatePolicy::default(),
        };
        let parser = ParserConfig {
            expected_articles: parse_expected_articles(&expected)?,
            duplicate_policy,
        };

        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            capacity: env_number("CACHE_CAPACITY")?.unwrap_or(defaults.capacity),
            ttl_speed: env_secs("CACHE_TTL_SPEED_SECS")?.unwrap_or(defaults.ttl_speed),
            ttl_balanced: env_secs("CACHE_TTL_BALANCED_SECS")?.unwrap_or(defaults.ttl_balanced),
            ttl_quality: env_secs("CACHE_TTL_QUALITY_SECS")?.unwrap_or(defaults.ttl_quality),
            sweep_interval: env_secs("CACHE_SWEEP_SECS")?.unwrap_or(defaults.sweep_interval),
        };

        Ok(Self {
            server_addr,
            corpus_dir: env_path("CORPUS_DIR"),
            neighborhoods_path: env_path("NEIGHBORHOODS_PATH"),
            zones_path: env_path("ZONES_PATH"),
            scoring_config_path: env_path("SCORING_CONFIG_PATH"),
            parser,
            cache,
        })
    }

    /// Configuración de ranking: la del fichero indicado o la por defecto.
    pub fn scoring_config(&self) -> Result<ScoringConfig> {
        match &self.scoring_config_path {
            Some(path) => {
                let json = std::fs::read_to_string(path).with_context(|| {
                    format!("No se pudo leer la configuración de ranking {}", path.display())
                })?;
                ScoringConfig::from_json_str(&json)
                    .with_context(|| format!("Configuración de ranking inválida en {}", path.display()))
            }
            None => Ok(ScoringConfig::default()),
        }
    }
}

/// Interpreta `PDUS=217,LUOS=121`. Los tipos de documento se pasan a
/// mayúsculas, igual que al derivarlos del nombre de fichero.
pub fn parse_expected_articles(value: &str) -> Result<BTreeMap<String, usize>> {
    let mut expected = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (document_type, count) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Entrada inválida en EXPECTED_ARTICLES: '{pair}'"))?;
        let count: usize = count
            .trim()
            .parse()
            .with_context(|| format!("Número de artículos inválido para {document_type}"))?;
        expected.insert(document_type.trim().to_uppercase(), count);
    }
    Ok(expected)
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} debe ser un número entero: '{value}'")),
        Err(_) => Ok(None),
    }
}

fn env_secs(name: &str) -> Result<Option<Duration>> {
    Ok(env_number(name)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_articles_pairs() {
        let expected = parse_expected_articles("pdus=217, LUOS = 121,").unwrap();
        assert_eq!(expected.get("PDUS"), Some(&217));
        assert_eq!(expected.get("LUOS"), Some(&121));
        assert!(parse_expected_articles("").unwrap().is_empty());
    }

    #[test]
    fn malformed_expected_articles_fail() {
        assert!(parse_expected_articles("PDUS").is_err());
        assert!(parse_expected_articles("PDUS=muitos").is_err());
    }

    #[test]
    fn default_expected_articles() {
        let expected = parse_expected_articles(DEFAULT_EXPECTED_ARTICLES).unwrap();
        assert_eq!(expected.len(), 2);
    }
}
