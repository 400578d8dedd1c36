//! Seeded synthetic passenger table.
//!
//! Every column is an independent draw; the survival label is a Bernoulli
//! trial over a hand-weighted sum of indicator features plus Gaussian noise.

use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    Rng, SeedableRng,
};
use rand_distr::{LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::dataset::{quantile, Dataset, PassengerRow};
use crate::error::{PredictorError, Result};

/// Indicator weights of the survival heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalWeights {
    pub female: f64,
    pub first_class: f64,
    pub second_class: f64,
    pub child: f64,
    pub high_fare: f64,
    pub noise_std: f64,
    /// Ages strictly below this count as children.
    pub child_age: f64,
    /// Fares strictly above this quantile of the generated fares count as high.
    pub high_fare_quantile: f64,
}

impl Default for SurvivalWeights {
    fn default() -> Self {
        Self {
            female: 0.4,
            first_class: 0.3,
            second_class: 0.15,
            child: 0.2,
            high_fare: 0.1,
            noise_std: 0.1,
            child_age: 16.0,
            high_fare_quantile: 0.75,
        }
    }
}

const PCLASSES: [u8; 3] = [1, 2, 3];
const PCLASS_P: [f64; 3] = [0.2, 0.2, 0.6];
const SEXES: [&str; 2] = ["male", "female"];
const SEX_P: [f64; 2] = [0.65, 0.35];
const SIBSP_P: [f64; 5] = [0.7, 0.15, 0.1, 0.03, 0.02];
const PARCH_P: [f64; 4] = [0.8, 0.12, 0.06, 0.02];
const PORTS: [&str; 3] = ["C", "Q", "S"];
const PORT_P: [f64; 3] = [0.2, 0.1, 0.7];

const AGE_MEAN: f64 = 30.0;
const AGE_STD: f64 = 12.0;
const AGE_RANGE: (f64, f64) = (1.0, 80.0);
const FARE_LOG_MEAN: f64 = 3.0;
const FARE_LOG_STD: f64 = 1.0;
const FARE_RANGE: (f64, f64) = (5.0, 500.0);

pub struct Synthesizer {
    rng: StdRng,
    weights: SurvivalWeights,
}

impl Synthesizer {
    pub fn new(seed: u64) -> Self {
        Self::with_weights(seed, SurvivalWeights::default())
    }

    pub fn with_weights(seed: u64, weights: SurvivalWeights) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            weights,
        }
    }

    /// Generates `n` labeled rows. Columns are drawn one at a time (all
    /// classes, then all sexes, ...) so the stream layout is stable.
    pub fn generate(&mut self, n: usize) -> Result<Dataset> {
        if n == 0 {
            return Err(PredictorError::Training("sample count must be positive".into()));
        }

        let pclass = self.choose(&PCLASSES, &PCLASS_P, n)?;
        let sex = self.choose(&SEXES, &SEX_P, n)?;
        let ages = Normal::new(AGE_MEAN, AGE_STD).map_err(bad_distribution)?;
        let age: Vec<f64> = (0..n)
            .map(|_| ages.sample(&mut self.rng).clamp(AGE_RANGE.0, AGE_RANGE.1))
            .collect();
        let sibsp = self.choose(&[0u32, 1, 2, 3, 4], &SIBSP_P, n)?;
        let parch = self.choose(&[0u32, 1, 2, 3], &PARCH_P, n)?;
        let fares = LogNormal::new(FARE_LOG_MEAN, FARE_LOG_STD).map_err(bad_distribution)?;
        let fare: Vec<f64> = (0..n)
            .map(|_| fares.sample(&mut self.rng).clamp(FARE_RANGE.0, FARE_RANGE.1))
            .collect();
        let embarked = self.choose(&PORTS, &PORT_P, n)?;

        let w = self.weights;
        let noise = Normal::new(0.0, w.noise_std).map_err(bad_distribution)?;
        let fare_cut = quantile(&fare, w.high_fare_quantile).unwrap_or(f64::INFINITY);
        let survival_p: Vec<f64> = (0..n)
            .map(|i| {
                let score = indicator(sex[i] == "female") * w.female
                    + indicator(pclass[i] == 1) * w.first_class
                    + indicator(pclass[i] == 2) * w.second_class
                    + indicator(age[i] < w.child_age) * w.child
                    + indicator(fare[i] > fare_cut) * w.high_fare
                    + noise.sample(&mut self.rng);
                score.clamp(0.0, 1.0)
            })
            .collect();

        let rows = (0..n)
            .map(|i| PassengerRow {
                pclass: pclass[i],
                sex: sex[i].to_string(),
                age: Some(age[i]),
                sibsp: sibsp[i],
                parch: parch[i],
                fare: Some(fare[i]),
                embarked: Some(embarked[i].to_string()),
                survived: u8::from(self.rng.gen::<f64>() < survival_p[i]),
            })
            .collect();

        Ok(Dataset::new(rows))
    }

    fn choose<T: Copy>(&mut self, items: &[T], weights: &[f64], n: usize) -> Result<Vec<T>> {
        let dist = WeightedIndex::new(weights)
            .map_err(|e| PredictorError::Training(format!("bad category weights: {e}")))?;
        Ok((0..n).map(|_| items[dist.sample(&mut self.rng)]).collect())
    }
}

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn bad_distribution(e: rand_distr::NormalError) -> PredictorError {
    PredictorError::Training(format!("bad distribution parameters: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_table() {
        let a = Synthesizer::new(42).generate(200).unwrap();
        let b = Synthesizer::new(42).generate(200).unwrap();
        assert_eq!(a, b);

        let c = Synthesizer::new(43).generate(200).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn values_stay_in_range() {
        let ds = Synthesizer::new(1).generate(1000).unwrap();
        for r in &ds.rows {
            assert!((1..=3).contains(&r.pclass));
            assert!(r.sex == "male" || r.sex == "female");
            let age = r.age.unwrap();
            assert!((1.0..=80.0).contains(&age));
            let fare = r.fare.unwrap();
            assert!((5.0..=500.0).contains(&fare));
            assert!(r.sibsp <= 4);
            assert!(r.parch <= 3);
            assert!(matches!(r.embarked.as_deref(), Some("C" | "Q" | "S")));
            assert!(r.survived <= 1);
        }
    }

    #[test]
    fn proportions_roughly_match() {
        let ds = Synthesizer::new(42).generate(5000).unwrap();
        let n = ds.len() as f64;
        let third = ds.rows.iter().filter(|r| r.pclass == 3).count() as f64 / n;
        let female = ds.rows.iter().filter(|r| r.sex == "female").count() as f64 / n;
        assert!((third - 0.6).abs() < 0.05, "third class share {third}");
        assert!((female - 0.35).abs() < 0.05, "female share {female}");
    }

    #[test]
    fn women_survive_more() {
        let ds = Synthesizer::new(42).generate(3000).unwrap();
        let rate = |sex: &str| {
            let group: Vec<_> = ds.rows.iter().filter(|r| r.sex == sex).collect();
            group.iter().filter(|r| r.survived == 1).count() as f64 / group.len() as f64
        };
        assert!(rate("female") > rate("male") + 0.2);
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(Synthesizer::new(0).generate(0).is_err());
    }

    #[test]
    fn negative_noise_is_rejected() {
        let weights = SurvivalWeights {
            noise_std: -1.0,
            ..SurvivalWeights::default()
        };
        assert!(Synthesizer::with_weights(1, weights).generate(10).is_err());
    }
}
