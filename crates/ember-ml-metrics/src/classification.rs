use ember_ml_core::{MlError, MlResult};

fn check_lengths(a: usize, b: usize) -> MlResult<()> {
    if a == 0 {
        return Err(MlError::EmptyInput);
    }
    if a != b {
        return Err(MlError::DimensionMismatch(format!(
            "y_true has {} entries but y_pred has {}",
            a, b
        )));
    }
    Ok(())
}

/// Sorted union of the true and predicted label sets. Using the union keeps
/// iteration order deterministic even when a class is never predicted.
fn class_union(y_true: &[usize], y_pred: &[usize]) -> Vec<usize> {
    let mut classes: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Fraction of exactly matching predictions.
pub fn accuracy_score(y_true: &[usize], y_pred: &[usize]) -> MlResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Confusion matrix over the sorted union of observed classes.
///
/// Returns `(classes, matrix)` where `matrix[i][j]` counts samples of true
/// class `classes[i]` predicted as `classes[j]`.
#[allow(clippy::type_complexity)]
pub fn confusion_matrix(
    y_true: &[usize],
    y_pred: &[usize],
) -> MlResult<(Vec<usize>, Vec<Vec<usize>>)> {
    check_lengths(y_true.len(), y_pred.len())?;
    let classes = class_union(y_true, y_pred);
    let index = |c: usize| classes.binary_search(&c).expect("class from union");
    let k = classes.len();
    let mut matrix = vec![vec![0usize; k]; k];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        matrix[index(t)][index(p)] += 1;
    }
    Ok((classes, matrix))
}

/// Averaging mode for multi-class precision/recall/F1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Aggregate TP/FP/FN globally before dividing.
    Micro,
    /// Unweighted mean of per-class scores.
    Macro,
    /// Mean of per-class scores weighted by class support.
    Weighted,
}

struct ClassCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
    support: usize,
}

fn per_class_counts(y_true: &[usize], y_pred: &[usize]) -> Vec<ClassCounts> {
    let classes = class_union(y_true, y_pred);
    classes
        .iter()
        .map(|&c| {
            let mut counts = ClassCounts {
                tp: 0,
                fp: 0,
                fn_: 0,
                support: 0,
            };
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                if t == c {
                    counts.support += 1;
                    if p == c {
                        counts.tp += 1;
                    } else {
                        counts.fn_ += 1;
                    }
                } else if p == c {
                    counts.fp += 1;
                }
            }
            counts
        })
        .collect()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision = TP / (TP + FP), averaged per [`Average`].
pub fn precision_score(y_true: &[usize], y_pred: &[usize], average: Average) -> MlResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let counts = per_class_counts(y_true, y_pred);
    match average {
        Average::Micro => {
            let tp: usize = counts.iter().map(|c| c.tp).sum();
            let fp: usize = counts.iter().map(|c| c.fp).sum();
            Ok(ratio(tp, tp + fp))
        }
        Average::Macro => Ok(counts
            .iter()
            .map(|c| ratio(c.tp, c.tp + c.fp))
            .sum::<f64>()
            / counts.len() as f64),
        Average::Weighted => {
            let total: usize = counts.iter().map(|c| c.support).sum();
            Ok(counts
                .iter()
                .map(|c| ratio(c.tp, c.tp + c.fp) * c.support as f64)
                .sum::<f64>()
                / total as f64)
        }
    }
}

/// Recall = TP / (TP + FN), averaged per [`Average`].
pub fn recall_score(y_true: &[usize], y_pred: &[usize], average: Average) -> MlResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let counts = per_class_counts(y_true, y_pred);
    match average {
        Average::Micro => {
            let tp: usize = counts.iter().map(|c| c.tp).sum();
            let fn_: usize = counts.iter().map(|c| c.fn_).sum();
            Ok(ratio(tp, tp + fn_))
        }
        Average::Macro => Ok(counts
            .iter()
            .map(|c| ratio(c.tp, c.tp + c.fn_))
            .sum::<f64>()
            / counts.len() as f64),
        Average::Weighted => {
            let total: usize = counts.iter().map(|c| c.support).sum();
            Ok(counts
                .iter()
                .map(|c| ratio(c.tp, c.tp + c.fn_) * c.support as f64)
                .sum::<f64>()
                / total as f64)
        }
    }
}

/// F1 = harmonic mean of precision and recall, averaged per [`Average`].
pub fn f1_score(y_true: &[usize], y_pred: &[usize], average: Average) -> MlResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let counts = per_class_counts(y_true, y_pred);
    let f1_of = |c: &ClassCounts| {
        let p = ratio(c.tp, c.tp + c.fp);
        let r = ratio(c.tp, c.tp + c.fn_);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    };
    match average {
        Average::Micro => {
            // Micro precision and recall share TP and coincide, and so does F1.
            let tp: usize = counts.iter().map(|c| c.tp).sum();
            let fp: usize = counts.iter().map(|c| c.fp).sum();
            let fn_: usize = counts.iter().map(|c| c.fn_).sum();
            let p = ratio(tp, tp + fp);
            let r = ratio(tp, tp + fn_);
            Ok(if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) })
        }
        Average::Macro => Ok(counts.iter().map(f1_of).sum::<f64>() / counts.len() as f64),
        Average::Weighted => {
            let total: usize = counts.iter().map(|c| c.support).sum();
            Ok(counts
                .iter()
                .map(|c| f1_of(c) * c.support as f64)
                .sum::<f64>()
                / total as f64)
        }
    }
}

/// Area under the ROC curve for binary labels, by the trapezoidal rule over
/// score-sorted thresholds. Degenerate single-class input scores 0.5.
pub fn roc_auc_score(y_true: &[usize], y_score: &[f64]) -> MlResult<f64> {
    check_lengths(y_true.len(), y_score.len())?;
    if y_true.iter().any(|&t| t > 1) {
        return Err(MlError::InvalidConfiguration(
            "roc_auc_score expects binary labels in {0, 1}".to_string(),
        ));
    }
    let mut pairs: Vec<(f64, usize)> = y_score
        .iter()
        .copied()
        .zip(y_true.iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let total_pos = y_true.iter().filter(|&&t| t == 1).count() as f64;
    let total_neg = y_true.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return Ok(0.5);
    }

    let mut auc = 0.0;
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut prev_tpr = 0.0;
    let mut prev_fpr = 0.0;
    for (_, label) in &pairs {
        if *label == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let tpr = tp / total_pos;
        let fpr = fp / total_neg;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }
    Ok(auc)
}

/// Binary cross-entropy of probabilistic predictions, with probabilities
/// clamped away from 0 and 1.
pub fn log_loss(y_true: &[usize], y_prob: &[f64]) -> MlResult<f64> {
    check_lengths(y_true.len(), y_prob.len())?;
    let eps = 1e-15;
    let mut total = 0.0;
    for (&t, &p) in y_true.iter().zip(y_prob.iter()) {
        if t > 1 {
            return Err(MlError::InvalidConfiguration(
                "log_loss expects binary labels in {0, 1}".to_string(),
            ));
        }
        let p = p.max(eps).min(1.0 - eps);
        total -= t as f64 * p.ln() + (1.0 - t as f64) * (1.0 - p).ln();
    }
    Ok(total / y_true.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy() {
        let acc = accuracy_score(&[1, 0, 1, 1], &[1, 0, 0, 1]).unwrap();
        assert_relative_eq!(acc, 0.75);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(accuracy_score(&[1, 0], &[1]).is_err());
        assert!(accuracy_score(&[], &[]).is_err());
    }

    #[test]
    fn test_confusion_matrix_union_classes() {
        // Class 2 only appears in predictions; it still gets a row/column.
        let (classes, m) = confusion_matrix(&[0, 0, 1, 1], &[0, 2, 1, 1]).unwrap();
        assert_eq!(classes, vec![0, 1, 2]);
        assert_eq!(m[0][0], 1);
        assert_eq!(m[0][2], 1);
        assert_eq!(m[1][1], 2);
    }

    #[test]
    fn test_precision_recall_binary() {
        let y_true = [1, 1, 0, 0, 1];
        let y_pred = [1, 0, 0, 1, 1];
        // Class 1: TP=2, FP=1, FN=1.
        let p = precision_score(&y_true, &y_pred, Average::Macro).unwrap();
        let r = recall_score(&y_true, &y_pred, Average::Macro).unwrap();
        // Class 0: TP=1, FP=1, FN=1 → P=0.5, R=0.5; class 1 → 2/3, 2/3.
        assert_relative_eq!(p, (0.5 + 2.0 / 3.0) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(r, (0.5 + 2.0 / 3.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_micro_equals_accuracy() {
        let y_true = [0, 1, 2, 1, 0, 2, 2];
        let y_pred = [0, 2, 2, 1, 0, 0, 2];
        let acc = accuracy_score(&y_true, &y_pred).unwrap();
        let p = precision_score(&y_true, &y_pred, Average::Micro).unwrap();
        let r = recall_score(&y_true, &y_pred, Average::Micro).unwrap();
        let f = f1_score(&y_true, &y_pred, Average::Micro).unwrap();
        assert_relative_eq!(p, acc);
        assert_relative_eq!(r, acc);
        assert_relative_eq!(f, acc);
    }

    #[test]
    fn test_weighted_f1() {
        let y_true = [0, 0, 0, 1];
        let y_pred = [0, 0, 1, 1];
        // Class 0: P=1, R=2/3, F1=0.8, support 3; class 1: P=0.5, R=1, F1=2/3, support 1.
        let f = f1_score(&y_true, &y_pred, Average::Weighted).unwrap();
        assert_relative_eq!(f, (0.8 * 3.0 + 2.0 / 3.0) / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_ranking() {
        let auc = roc_auc_score(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_relative_eq!(auc, 1.0);
        let auc = roc_auc_score(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_relative_eq!(auc, 0.0);
    }

    #[test]
    fn test_roc_auc_single_class() {
        assert_relative_eq!(roc_auc_score(&[1, 1], &[0.3, 0.6]).unwrap(), 0.5);
    }

    #[test]
    fn test_log_loss_confident_correct() {
        let ll = log_loss(&[1, 0], &[0.9, 0.1]).unwrap();
        assert_relative_eq!(ll, -(0.9_f64.ln()), epsilon = 1e-12);
        let worse = log_loss(&[1, 0], &[0.6, 0.4]).unwrap();
        assert!(worse > ll);
    }
}
