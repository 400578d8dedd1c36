use std::sync::Arc;

use anyhow::Context;
use titanic_predictor::{config::ServeConfig, logging, server, Predictor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = ServeConfig::from_env()?;
    let predictor = Predictor::load(&cfg.model_dir, cfg.imputation.clone())
        .with_context(|| {
            format!(
                "model bundle not usable in {}; run the `train` binary first",
                cfg.model_dir.display()
            )
        })?
        .with_vector_logging(cfg.log_pred);

    let bundle = predictor.bundle();
    tracing::info!(
        trees = bundle.classifier.trees().len(),
        columns = ?bundle.feature_columns,
        "loaded model bundle from {}",
        cfg.model_dir.display()
    );

    let app = server::router(Arc::new(predictor));

    let addr = cfg.socket_addr()?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
