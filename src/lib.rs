//! Indexador jerárquico de legislación urbanística y motor de recuperación
//! contextual.
//!
//! Ingesta: texto plano → `normalize` → `parser` → `keywords` → `corpus`.
//! Consulta: `entities` + candidatos de similitud externos → `scoring`,
//! envuelto por `cache`.

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod keywords;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod scoring;
