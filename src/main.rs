use std::sync::{Arc, Mutex, RwLock};

use anyhow::Context;
use axum::Router;
use legal_rag_index::{
    api,
    app_state::{AppState, Status},
    cache::{spawn_sweeper, CachedRanker},
    config::AppConfig,
    corpus::Corpus,
    entities::{EntityExtractor, Registry},
    ingest,
    keywords::Enricher,
    scoring::ScoringEngine,
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Registros canónicos (bairros y zonas)
    let neighborhoods = match &cfg.neighborhoods_path {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin_neighborhoods()?,
    };
    let zones = match &cfg.zones_path {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin_zones()?,
    };
    info!(
        bairros = neighborhoods.len(),
        zonas = zones.len(),
        "Registros canónicos cargados"
    );
    let extractor = EntityExtractor::new(neighborhoods, zones);

    // 4. Motor de ranking con caché de resultados
    let engine = ScoringEngine::new(&cfg.scoring_config()?)
        .context("Configuración de ranking inválida")?;
    let ranker = Arc::new(CachedRanker::in_memory(engine, cfg.cache.clone()));
    let _sweeper = spawn_sweeper(ranker.store(), cfg.cache.sweep_interval);

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        corpus: Arc::new(RwLock::new(Arc::new(Corpus::empty()))),
        extractor: Arc::new(extractor),
        ranker,
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        })),
        current_dir: Arc::new(Mutex::new(cfg.corpus_dir.clone())),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Ingesta inicial si hay un corpus configurado
    if let Some(dir) = &cfg.corpus_dir {
        match ingest::ingest_directory(dir, &cfg.parser, Enricher::default(), app_state.status.clone()).await {
            Ok((corpus, summary)) => {
                app_state.replace_corpus(corpus);
                app_state.status().message = format!("Corpus inicial cargado. {}", summary);
            }
            Err(err) => warn!("No se pudo ingerir {}: {}", dir.display(), err),
        }
    }

    // 7. Configurar el router de la API
    let app = Router::new().merge(api::create_router(app_state.clone())).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 8. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error del servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
