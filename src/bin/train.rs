use anyhow::Context;
use titanic_predictor::{config::TrainConfig, logging, train};

fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = TrainConfig::from_env()?;
    let trained = train::train(&cfg).context("training run failed")?;
    let report = &trained.report;

    tracing::info!(accuracy = report.accuracy, "model evaluated");
    tracing::info!("classification report:\n{}", report.classification);
    tracing::info!(confusion = ?report.classification.confusion, "confusion matrix");
    for (column, importance) in &report.feature_importance {
        tracing::info!(feature = %column, importance, "feature importance");
    }

    trained
        .bundle
        .save(&cfg.output_dir)
        .with_context(|| format!("failed to write bundle to {}", cfg.output_dir.display()))?;
    tracing::info!(
        dir = %cfg.output_dir.display(),
        accuracy = report.accuracy,
        "training complete"
    );
    Ok(())
}
