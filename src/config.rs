use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::forest::ForestParams;
use crate::model::ImputationDefaults;
use crate::synth::SurvivalWeights;

pub const DEFAULT_MODEL_DIR: &str = "models";

/// Serving settings, read from the environment once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub model_dir: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    /// `LOG_PRED=1` logs every encoded request vector.
    pub log_pred: bool,
    /// From the JSON file named by `IMPUTATION_CONFIG`, if set.
    pub imputation: ImputationDefaults,
}

impl ServeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match get("PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid PORT {p:?}"))?,
            None => 5000,
        };
        let imputation = match get("IMPUTATION_CONFIG") {
            Some(path) => {
                let data = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read imputation config {path}"))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("invalid imputation config {path}"))?
            }
            None => ImputationDefaults::default(),
        };
        Ok(Self {
            model_dir: get("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_pred: get("LOG_PRED").as_deref() == Some("1"),
            imputation,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .with_context(|| format!("invalid BIND_ADDR {:?}", self.bind_addr))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub seed: u64,
    pub n_samples: usize,
    pub test_fraction: f64,
    pub output_dir: PathBuf,
    pub forest: ForestParams,
    pub weights: SurvivalWeights,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_samples: 1000,
            test_fraction: 0.2,
            output_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            forest: ForestParams::default(),
            weights: SurvivalWeights::default(),
        }
    }
}

impl TrainConfig {
    pub fn load(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read training config {path}"))?;
        let cfg: Self = serde_json::from_str(&data)
            .with_context(|| format!("invalid training config {path}"))?;
        let seed = cfg.seed;
        Ok(cfg.with_seed(seed))
    }

    /// `TRAIN_CONFIG` file (if set), then `TRAIN_SEED`, `TRAIN_SAMPLES`
    /// and `MODEL_DIR` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match get("TRAIN_CONFIG") {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        if let Some(seed) = get("TRAIN_SEED") {
            let seed = seed
                .parse()
                .with_context(|| format!("invalid TRAIN_SEED {seed:?}"))?;
            cfg = cfg.with_seed(seed);
        }
        if let Some(n) = get("TRAIN_SAMPLES") {
            cfg.n_samples = n
                .parse()
                .with_context(|| format!("invalid TRAIN_SAMPLES {n:?}"))?;
        }
        if let Some(dir) = get("MODEL_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        Ok(cfg)
    }

    /// One seed drives synthesis, the split and the forest; `forest.seed`
    /// in a config file is overwritten by the top-level `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.forest.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn serve_defaults() {
        let cfg = ServeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.model_dir, PathBuf::from("models"));
        assert_eq!(cfg.port, 5000);
        assert!(!cfg.log_pred);
        assert_eq!(cfg.imputation, ImputationDefaults::default());
        assert_eq!(cfg.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn serve_overrides() {
        let cfg = ServeConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MODEL_DIR", "/tmp/m"),
            ("BIND_ADDR", "127.0.0.1"),
            ("LOG_PRED", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.model_dir, PathBuf::from("/tmp/m"));
        assert!(cfg.log_pred);
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn ipv6_bind_address() {
        let cfg = ServeConfig::from_lookup(lookup(&[("BIND_ADDR", "::"), ("PORT", "5001")])).unwrap();
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "[::]:5001");

        let bad = ServeConfig::from_lookup(lookup(&[("BIND_ADDR", "localhost:80")])).unwrap();
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn config_file_seed_reaches_the_forest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, r#"{"seed": 7}"#).unwrap();
        let path = path.to_string_lossy().into_owned();

        let cfg = TrainConfig::from_lookup(lookup(&[("TRAIN_CONFIG", path.as_str())])).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.forest.seed, 7);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(ServeConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn train_defaults_match_reference_run() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.n_samples, 1000);
        assert_eq!(cfg.forest.n_estimators, 100);
        assert_eq!(cfg.forest.max_depth, Some(10));
        assert_eq!(cfg.forest.min_samples_split, 5);
        assert_eq!(cfg.forest.min_samples_leaf, 2);
    }

    #[test]
    fn train_env_overrides() {
        let cfg =
            TrainConfig::from_lookup(lookup(&[("TRAIN_SEED", "7"), ("TRAIN_SAMPLES", "300")]))
                .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.forest.seed, 7);
        assert_eq!(cfg.n_samples, 300);
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{"n_samples": 50, "forest": {"n_estimators": 5}}"#).unwrap();
        assert_eq!(cfg.n_samples, 50);
        assert_eq!(cfg.forest.n_estimators, 5);
        assert_eq!(cfg.forest.max_depth, Some(10));
        assert_eq!(cfg.test_fraction, 0.2);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(TrainConfig::from_lookup(lookup(&[("TRAIN_CONFIG", "/nonexistent/cfg.json")])).is_err());
    }
}
