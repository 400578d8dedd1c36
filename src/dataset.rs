use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

/// A labeled training row. Numeric fields may be missing before `fill_missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerRow {
    pub pclass: u8,
    pub sex: String,
    pub age: Option<f64>,
    pub sibsp: u32,
    pub parch: u32,
    pub fare: Option<f64>,
    pub embarked: Option<String>,
    pub survived: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<PassengerRow>,
}

impl Dataset {
    pub fn new(rows: Vec<PassengerRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.survived as usize).collect()
    }

    /// Fills missing age and fare with the column median and missing port
    /// with the column mode. Columns with no observed values are left alone.
    pub fn fill_missing(&mut self) {
        let age = median(self.rows.iter().filter_map(|r| r.age));
        let fare = median(self.rows.iter().filter_map(|r| r.fare));
        let port = mode(self.rows.iter().filter_map(|r| r.embarked.as_deref()));

        for row in &mut self.rows {
            if row.age.is_none() {
                row.age = age;
            }
            if row.fare.is_none() {
                row.fare = fare;
            }
            if row.embarked.is_none() {
                row.embarked = port.clone();
            }
        }
    }
}

pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(v[lo] + (v[hi] - v[lo]) * frac)
}

/// Most frequent label; ties resolve to the smallest label.
pub fn mode<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string())
}

/// Stratified train/test split over row indices.
///
/// Each class is shuffled independently with the seeded generator and
/// `round(test_fraction * class_count)` of its rows go to the test side,
/// so both sides keep the label proportions.
pub fn stratified_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(PredictorError::Training(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (class, mut indices) in by_class {
        if indices.len() < 2 {
            return Err(PredictorError::Training(format!(
                "class {class} has {} sample(s); stratified split needs at least 2",
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
