//! Ingesta de un directorio de normas en texto plano: cada fichero se
//! parsea en el pool bloqueante de forma independiente y el resultado se
//! combina en una nueva generación del corpus.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{
    app_state::{lock_status, Status},
    corpus::{Corpus, ParsedDocument},
    keywords::Enricher,
    models::NodeType,
    parser::{parse_document, ParserConfig},
};

const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestionSummary {
    pub files_scanned: u32,
    pub files_ingested: u32,
    pub files_skipped: u32,
    pub nodes_created: usize,
    pub articles: usize,
    pub warnings: usize,
    pub conflicts: usize,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} ingeridos, {} omitidos. {} nodos, {} artículos, {} avisos y {} conflictos.",
            self.files_scanned,
            self.files_ingested,
            self.files_skipped,
            self.nodes_created,
            self.articles,
            self.warnings,
            self.conflicts
        )
    }
}

/// Recorre recursivamente un directorio, parsea cada norma en su propia
/// tarea bloqueante y devuelve el corpus resultante junto con el resumen.
pub async fn ingest_directory(
    root: &Path,
    config: &ParserConfig,
    enricher: Enricher,
    status_arc: Arc<Mutex<Status>>,
) -> Result<(Corpus, IngestionSummary)> {
    if !root.is_dir() {
        return Err(anyhow!(
            "La ruta no es un directorio: {}",
            root.display()
        ));
    }

    let mut summary = IngestionSummary::default();
    let file_entries: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    summary.files_scanned = file_entries.len() as u32;

    let mut tasks = FuturesUnordered::new();
    for path in file_entries {
        if !has_accepted_extension(&path) {
            info!("Saltando fichero con extensión no soportada: {}", path.display());
            summary.files_skipped += 1;
            continue;
        }
        let config = config.clone();
        tasks.push(async move {
            let task_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || load_and_parse(&task_path, &config)).await;
            (path, outcome)
        });
    }

    let total = tasks.len().max(1) as f32;
    let mut done = 0usize;
    let mut documents: Vec<ParsedDocument> = Vec::new();

    while let Some((path, outcome)) = tasks.next().await {
        done += 1;
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let message = match outcome {
            Ok(Some(document)) => {
                summary.files_ingested += 1;
                summary.nodes_created += document.nodes().len();
                summary.articles += document.count(NodeType::Article);
                summary.warnings += document.warnings.len();
                summary.conflicts += document.conflicts.len();
                let message = format!(
                    "[{}/{}] Parseado: {} ({} artículos)",
                    done,
                    total as u32,
                    filename,
                    document.count(NodeType::Article)
                );
                documents.push(document);
                message
            }
            Ok(None) => {
                summary.files_skipped += 1;
                format!("[{}/{}] Omitido: {}", done, total as u32, filename)
            }
            Err(err) => {
                summary.files_skipped += 1;
                error!("Error parseando {}: {err}", path.display());
                format!("ERROR en {}: {}", path.display(), err)
            }
        };

        let mut status = lock_status(&status_arc);
        status.message = message;
        status.progress = done as f32 / total;
    }

    // El orden de llegada depende del planificador; el corpus no.
    documents.sort_by(|a, b| a.document_type.cmp(&b.document_type));
    let corpus = Corpus::new(documents, enricher);
    info!("Ingesta completada. {}", summary);
    Ok((corpus, summary))
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Tipo de documento a partir del nombre del fichero (`luos.txt` → `LUOS`).
pub fn document_type_for(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().trim().to_uppercase();
    (!stem.is_empty()).then_some(stem)
}

fn load_and_parse(path: &Path, config: &ParserConfig) -> Option<ParsedDocument> {
    let Some(document_type) = document_type_for(path) else {
        warn!("No se pudo derivar el tipo de documento de {}", path.display());
        return None;
    };
    let text = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            warn!("Saltando fichero no-texto o no-UTF8: {}", path.display());
            return None;
        }
    };
    if text.trim().is_empty() {
        warn!("Fichero vacío o sin texto útil: {}", path.display());
        return None;
    }

    let document = parse_document(&document_type, &text, config);
    for warning in &document.warnings {
        warn!(%document_type, "{warning}");
    }
    Some(document)
}
