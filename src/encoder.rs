use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

/// Label → integer code mapping for one categorical column.
///
/// Codes follow sorted label order, so fitting the same label set always
/// yields the same mapping. The encoder is never refit after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    field: String,
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<I, S>(field: &str, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeMap::new();
        for label in labels {
            seen.entry(label.as_ref().to_string()).or_insert(());
        }
        if seen.is_empty() {
            return Err(PredictorError::Training(format!(
                "cannot fit encoder for {field}: no labels"
            )));
        }
        Ok(Self {
            field: field.to_string(),
            classes: seen.into_keys().collect(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Labels in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, label: &str) -> Result<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map(|idx| idx as u32)
            .map_err(|_| PredictorError::UnknownCategory {
                field: self.field.clone(),
                label: label.to_string(),
            })
    }

    /// Encodes `label`, substituting the code of `fallback` when the label is
    /// unseen or absent. The fallback itself must be in the vocabulary.
    pub fn transform_or(&self, label: Option<&str>, fallback: &str) -> Result<u32> {
        match label.map(|l| self.transform(l)) {
            Some(Ok(code)) => Ok(code),
            Some(Err(PredictorError::UnknownCategory { label, .. })) => {
                tracing::debug!(field = %self.field, %label, fallback, "unseen category, using fallback");
                self.transform(fallback)
            }
            Some(Err(e)) => Err(e),
            None => self.transform(fallback),
        }
    }
}
