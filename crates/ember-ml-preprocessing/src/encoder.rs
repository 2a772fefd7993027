use ember_ml_core::{Float, MlError, MlResult};
use std::collections::HashMap;

/// Encode categorical string labels as contiguous integer indices.
///
/// Classes are sorted, so encodings are deterministic across runs.
pub struct LabelEncoder {
    classes: Vec<String>,
    class_to_idx: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        LabelEncoder {
            classes: Vec::new(),
            class_to_idx: HashMap::new(),
        }
    }

    pub fn fit(&mut self, labels: &[String]) -> MlResult<()> {
        if labels.is_empty() {
            return Err(MlError::EmptyInput);
        }
        let mut unique: Vec<String> = labels.to_vec();
        unique.sort();
        unique.dedup();
        self.class_to_idx = unique
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        self.classes = unique;
        Ok(())
    }

    pub fn transform(&self, labels: &[String]) -> MlResult<Vec<usize>> {
        if self.classes.is_empty() {
            return Err(MlError::NotFitted("LabelEncoder"));
        }
        labels
            .iter()
            .map(|l| {
                self.class_to_idx.get(l).copied().ok_or_else(|| {
                    MlError::InvalidConfiguration(format!("unseen label {:?}", l))
                })
            })
            .collect()
    }

    pub fn fit_transform(&mut self, labels: &[String]) -> MlResult<Vec<usize>> {
        self.fit(labels)?;
        self.transform(labels)
    }

    pub fn inverse_transform(&self, encoded: &[usize]) -> MlResult<Vec<String>> {
        if self.classes.is_empty() {
            return Err(MlError::NotFitted("LabelEncoder"));
        }
        encoded
            .iter()
            .map(|&i| {
                self.classes.get(i).cloned().ok_or_else(|| {
                    MlError::InvalidConfiguration(format!(
                        "index {} exceeds {} fitted classes",
                        i,
                        self.classes.len()
                    ))
                })
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

impl Default for LabelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// One-hot encode integer labels into binary indicator rows.
pub fn one_hot_encode<T: Float>(labels: &[usize], n_classes: usize) -> MlResult<Vec<Vec<T>>> {
    if n_classes == 0 {
        return Err(MlError::InvalidConfiguration(
            "one-hot encoding needs at least one class".to_string(),
        ));
    }
    labels
        .iter()
        .map(|&l| {
            if l >= n_classes {
                return Err(MlError::InvalidConfiguration(format!(
                    "label {} exceeds {} classes",
                    l, n_classes
                )));
            }
            let mut row = vec![T::ZERO; n_classes];
            row[l] = T::ONE;
            Ok(row)
        })
        .collect()
}
