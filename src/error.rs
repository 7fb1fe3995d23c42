//! Errores tipados de la librería (configuración y caché).
//!
//! Los avisos de parseo viven en `parser::ParseWarning`: no son errores,
//! nunca abortan un documento.

/// Configuración inválida del motor de ranking o de sus componentes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("modo de rendimiento desconocido: {0} (esperado: speed, balanced o quality)")]
    UnknownMode(String),

    #[error("el límite de resultados debe ser positivo")]
    NonPositiveLimit,

    #[error("patrón inválido '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("política de duplicados desconocida: {0} (esperado: keep-first o keep-last)")]
    UnknownDuplicatePolicy(String),

    #[error("registro canónico inválido: {reason}")]
    InvalidRegistry { reason: String },
}

/// Fallos del almacén de resultados. Nunca llegan al llamador del ranking:
/// la caché falla en abierto y se recalcula directamente.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("almacén de caché no disponible: {reason}")]
    Unavailable { reason: String },

    #[error("error del backend de caché: {reason}")]
    Backend { reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CacheResult<T> = Result<T, CacheError>;
