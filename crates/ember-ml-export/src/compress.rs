use ember_ml_core::{MlError, MlResult};
use serde::{Deserialize, Serialize};

/// Affine int8 encoding of a float buffer: `value ≈ (q − zero_point) · scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedTensor {
    pub values: Vec<i8>,
    pub scale: f64,
    pub zero_point: i32,
}

/// Quantize a float buffer to int8 with an affine mapping over the observed
/// range. Lossy; [`dequantize`] is the exact inverse of the mapping.
pub fn quantize(data: &[f64]) -> MlResult<QuantizedTensor> {
    if data.is_empty() {
        return Err(MlError::EmptyInput);
    }
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        // Degenerate range: one representable value, reproduced exactly.
        let scale = if min == 0.0 { 1.0 } else { min.abs() / 127.0 };
        let q = (min / scale).round() as i32;
        return Ok(QuantizedTensor {
            values: vec![q.clamp(-128, 127) as i8; data.len()],
            scale,
            zero_point: 0,
        });
    }

    let scale = (max - min) / 255.0;
    let zero_point = (-128.0 - min / scale).round() as i32;
    let values = data
        .iter()
        .map(|&v| ((v / scale).round() as i32 + zero_point).clamp(-128, 127) as i8)
        .collect();
    Ok(QuantizedTensor {
        values,
        scale,
        zero_point,
    })
}

/// Map an int8 buffer back to floats.
pub fn dequantize(q: &QuantizedTensor) -> Vec<f64> {
    q.values
        .iter()
        .map(|&v| (v as i32 - q.zero_point) as f64 * q.scale)
        .collect()
}

/// Zero every entry with magnitude below `threshold`.
///
/// Returns the pruned buffer and the kept-mask (`true` where the original
/// value survived).
pub fn prune(data: &[f64], threshold: f64) -> (Vec<f64>, Vec<bool>) {
    let mask: Vec<bool> = data.iter().map(|v| v.abs() >= threshold).collect();
    let pruned = data
        .iter()
        .zip(mask.iter())
        .map(|(&v, &keep)| if keep { v } else { 0.0 })
        .collect();
    (pruned, mask)
}

/// Fraction of zeroed entries in a pruned buffer.
pub fn sparsity(mask: &[bool]) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    mask.iter().filter(|&&keep| !keep).count() as f64 / mask.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_roundtrip_within_half_step() {
        let data = vec![-1.5, -0.25, 0.0, 0.3, 2.75];
        let q = quantize(&data).unwrap();
        let back = dequantize(&q);
        for (orig, rec) in data.iter().zip(back.iter()) {
            assert!(
                (orig - rec).abs() <= q.scale / 2.0 + 1e-12,
                "{} -> {} (scale {})",
                orig,
                rec,
                q.scale
            );
        }
    }

    #[test]
    fn test_quantize_spans_int8_range() {
        let data = vec![-1.0, 1.0];
        let q = quantize(&data).unwrap();
        assert_eq!(q.values[0], -128);
        assert_eq!(q.values[1], 127);
    }

    #[test]
    fn test_quantize_constant_buffer_exact() {
        let data = vec![3.5; 4];
        let q = quantize(&data).unwrap();
        let back = dequantize(&q);
        for v in back {
            assert!((v - 3.5).abs() < 1e-10, "got {}", v);
        }
    }

    #[test]
    fn test_quantize_empty_rejected() {
        assert_eq!(quantize(&[]), Err(MlError::EmptyInput));
    }

    #[test]
    fn test_prune_threshold() {
        let data = vec![0.05, -0.5, 0.001, 2.0, -0.09];
        let (pruned, mask) = prune(&data, 0.1);
        assert_eq!(pruned, vec![0.0, -0.5, 0.0, 2.0, 0.0]);
        assert_eq!(mask, vec![false, true, false, true, false]);
        assert!((sparsity(&mask) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_prune_zero_threshold_keeps_everything() {
        let data = vec![0.0, -1.0, 2.0];
        let (pruned, mask) = prune(&data, 0.0);
        assert_eq!(pruned, data);
        assert!(mask.iter().all(|&k| k));
    }
}
