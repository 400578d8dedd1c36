use std::fmt;

use serde::{Deserialize, Serialize};

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// `matrix[true][pred]` counts.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut m = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            m[t][p] += 1;
        }
    }
    m
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: (f64, f64, f64),
    pub weighted_avg: (f64, f64, f64),
    pub confusion: Vec<Vec<usize>>,
}

impl ClassificationReport {
    pub fn new(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let confusion = confusion_matrix(y_true, y_pred, n_classes);
        let classes: Vec<ClassScores> = (0..n_classes)
            .map(|c| {
                let tp = confusion[c][c] as f64;
                let predicted: usize = confusion.iter().map(|row| row[c]).sum();
                let support: usize = confusion[c].iter().sum();
                let precision = ratio(tp, predicted as f64);
                let recall = ratio(tp, support as f64);
                ClassScores {
                    class: c,
                    precision,
                    recall,
                    f1: ratio(2.0 * precision * recall, precision + recall),
                    support,
                }
            })
            .collect();

        let k = classes.len().max(1) as f64;
        let total: usize = classes.iter().map(|c| c.support).sum();
        let macro_avg = (
            classes.iter().map(|c| c.precision).sum::<f64>() / k,
            classes.iter().map(|c| c.recall).sum::<f64>() / k,
            classes.iter().map(|c| c.f1).sum::<f64>() / k,
        );
        let weigh = |f: fn(&ClassScores) -> f64| {
            ratio(
                classes.iter().map(|c| f(c) * c.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = (weigh(|c| c.precision), weigh(|c| c.recall), weigh(|c| c.f1));

        Self {
            accuracy: accuracy(y_true, y_pred),
            classes,
            macro_avg,
            weighted_avg,
            confusion,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        let total: usize = self.classes.iter().map(|c| c.support).sum();
        writeln!(f, "{:>14} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, total)?;
        let (p, r, f1) = self.macro_avg;
        writeln!(f, "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}", "macro avg", p, r, f1, total)?;
        let (p, r, f1) = self.weighted_avg;
        write!(f, "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}", "weighted avg", p, r, f1, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn report_matches_hand_computation() {
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 0, 1, 1, 0];
        let r = ClassificationReport::new(&y_true, &y_pred, 2);

        assert_eq!(r.confusion, vec![vec![2, 1], vec![1, 1]]);
        let c0 = &r.classes[0];
        assert!((c0.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((c0.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c0.support, 3);
        let c1 = &r.classes[1];
        assert!((c1.precision - 0.5).abs() < 1e-12);
        assert!((c1.recall - 0.5).abs() < 1e-12);
        assert!((r.accuracy - 0.6).abs() < 1e-12);
        assert!((r.weighted_avg.1 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn absent_class_scores_zero() {
        let r = ClassificationReport::new(&[0, 0], &[0, 0], 2);
        assert_eq!(r.classes[1].precision, 0.0);
        assert_eq!(r.classes[1].f1, 0.0);
        assert!(r.to_string().contains("weighted avg"));
    }
}
