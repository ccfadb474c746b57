use std::{path::Path, sync::Arc, time::Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    domain::DomainSplitter,
    error::{validation_error, AppError},
    explainer::Explainer,
    features::FeatureExtractor,
    model::ModelArtifact,
    types::PredictResponse,
};

/// Where the classifier comes from for each prediction.
enum ModelSource {
    /// Read the artifact from disk on every call.
    Reload(String),
    /// Loaded once at startup.
    Cached(Arc<ModelArtifact>),
}

pub struct PhishingDetector {
    extractor: FeatureExtractor,
    explainer: Explainer,
    model: ModelSource,
}

impl PhishingDetector {
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        info!("Initializing phishing detector...");

        let splitter = match &config.public_suffix_list {
            Some(path) => DomainSplitter::from_file(path).await?,
            None => DomainSplitter::embedded()?,
        };
        let splitter = Arc::new(splitter);

        let model = if config.reload_model {
            if !Path::new(&config.model_path).exists() {
                warn!(
                    "Model artifact not found at {}, predictions will fail until it exists",
                    config.model_path
                );
            }
            ModelSource::Reload(config.model_path.clone())
        } else {
            let model = ModelArtifact::load(&config.model_path).await?;
            info!("Loaded model {} from {}", model.version, config.model_path);
            ModelSource::Cached(Arc::new(model))
        };

        Ok(Self {
            extractor: FeatureExtractor::new(config, splitter.clone())?,
            explainer: Explainer::new(splitter)?,
            model,
        })
    }

    pub async fn predict(&self, url: Option<&str>) -> Result<PredictResponse, AppError> {
        let start_time = Instant::now();

        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(validation_error("No URL provided")),
        };

        let features = self.extractor.extract(url).await;

        let model = match &self.model {
            ModelSource::Reload(path) => Arc::new(ModelArtifact::load(path).await?),
            ModelSource::Cached(model) => model.clone(),
        };
        let score = model.score(&features)?;

        let reasons = self.explainer.explain(url);

        let latency = start_time.elapsed().as_secs_f64() * 1000.0;
        metrics::counter!("predictions_total", "verdict" => score.verdict.as_str()).increment(1);
        metrics::histogram!("prediction_duration_ms").record(latency);

        info!(
            "Prediction for {}: {} (prob: {:.3}, reasons: {}, latency: {:.1}ms)",
            url,
            score.verdict,
            score.probability,
            reasons.len(),
            latency
        );

        Ok(PredictResponse {
            url: url.to_string(),
            verdict: score.verdict,
            probability: score.probability,
            reasons,
            decision_id: Uuid::new_v4(),
            features,
        })
    }
}
