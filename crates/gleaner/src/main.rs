mod api;
mod scheduler;
mod state;

use std::sync::Arc;

use axum::Router;
use gleaner_core::{
    Annotator, DocumentPipeline, MongoSource, PgSink, Processor, Settings, SinkStore, SourceStore,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gleaner=info,gleaner_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        batch_size = settings.batch_size,
        interval_minutes = settings.interval_minutes,
        mark_processed = settings.mark_processed,
        "starting gleaner"
    );

    // Missing language resources put the service in degraded mode rather
    // than killing it; /health surfaces the state and stores stay probeable.
    let annotator = match Annotator::load() {
        Ok(annotator) => Some(Arc::new(annotator)),
        Err(err) => {
            tracing::error!(%err, "annotation resources failed to load; processing disabled");
            None
        }
    };

    let source: Arc<dyn SourceStore> = Arc::new(MongoSource::connect(&settings).await?);
    let sink: Arc<dyn SinkStore> = Arc::new(PgSink::connect(&settings)?);

    if let Err(err) = sink.ensure_schema().await {
        tracing::error!(%err, "sink schema provisioning failed; retried before the first insert");
    }

    let pipeline = annotator.map(|a| Arc::new(DocumentPipeline::new(a)));
    let processor = Arc::new(Processor::new(
        source.clone(),
        sink.clone(),
        pipeline,
        settings.batch_size,
    ));

    let source_ok = source.ping().await;
    let sink_ok = sink.ping().await;
    let scheduler = if source_ok && sink_ok {
        Some(scheduler::start(processor.clone(), settings.interval_minutes))
    } else {
        tracing::error!(source_ok, sink_ok, "stores unreachable; scheduler not started");
        None
    };

    let app_state = AppState {
        source,
        sink,
        processor,
        scheduler: scheduler.clone(),
    };

    let app = Router::new()
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(settings.http_addr).await?;
    tracing::info!("listening on http://{}", settings.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.shutdown();
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}
