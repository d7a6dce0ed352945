use serde::{
    Deserialize,
    Serialize,
};

/// Smoothing applied to extracted traces before picking an apex.
///
/// `level` is the half width of the smoothing window, in points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum SmoothingMethod {
    None,
    LinearWeightedMovingAverage { level: usize },
    SavitzkyGolay { level: usize },
    /// Gaussian kernel spanning `level` points on each side, `sigma = level / 2`.
    Gaussian { level: usize },
}

impl SmoothingMethod {
    pub const DEFAULT_LEVEL: usize = 3;
}

impl Default for SmoothingMethod {
    fn default() -> Self {
        Self::LinearWeightedMovingAverage {
            level: Self::DEFAULT_LEVEL,
        }
    }
}

/// Smooths the intensities with the given method.
///
/// The output always has the same length as the input, a zero level or a
/// trace too short for the window returns the data unchanged.
pub fn apply_smoothing(intensities: &[f64], method: &SmoothingMethod) -> Vec<f64> {
    match method {
        SmoothingMethod::None => intensities.to_vec(),
        SmoothingMethod::LinearWeightedMovingAverage { level } => {
            linear_weighted_moving_average(intensities, *level)
        }
        SmoothingMethod::SavitzkyGolay { level } => savitzky_golay_smooth(intensities, *level),
        SmoothingMethod::Gaussian { level } => gaussian_smooth(intensities, *level),
    }
}

/// Convolves with a symmetric kernel of `2 * half_window + 1` weights.
///
/// Near the edges the kernel is truncated and renormalized.
fn convolve_normalized(data: &[f64], kernel: &[f64], half_window: usize) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(data.len());
    for point_idx in 0..data.len() {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (kernel_offset, weight) in kernel.iter().enumerate() {
            let Some(data_idx) = (point_idx + kernel_offset).checked_sub(half_window) else {
                continue;
            };
            if let Some(value) = data.get(data_idx) {
                weighted_sum += value * weight;
                weight_total += weight;
            }
        }
        smoothed.push(weighted_sum / weight_total);
    }
    smoothed
}

fn linear_weighted_moving_average(data: &[f64], level: usize) -> Vec<f64> {
    if level == 0 || data.len() < 3 {
        return data.to_vec();
    }
    let kernel: Vec<f64> = (0..=2 * level)
        .map(|position| (level + 1 - position.abs_diff(level)) as f64)
        .collect();
    convolve_normalized(data, &kernel, level)
}

/// Quadratic Savitzky-Golay coefficients for a window of `2 * half_window + 1`.
fn savitzky_golay_weights(half_window: usize) -> Vec<f64> {
    let m = half_window as f64;
    let norm = (2.0 * m - 1.0) * (2.0 * m + 1.0) * (2.0 * m + 3.0);
    (0..=2 * half_window)
        .map(|position| {
            let i = position.abs_diff(half_window) as f64;
            (3.0 * (3.0 * m * m + 3.0 * m - 1.0) - 15.0 * i * i) / norm
        })
        .collect()
}

/// Least squares quadratic smoothing.
///
/// Points closer than `level` to an edge use the widest symmetric window
/// that fits, the outermost points are left untouched.
fn savitzky_golay_smooth(data: &[f64], level: usize) -> Vec<f64> {
    if level == 0 || data.len() < 3 {
        return data.to_vec();
    }
    let weights: Vec<Vec<f64>> = (0..=level).map(savitzky_golay_weights).collect();
    let last = data.len() - 1;
    (0..data.len())
        .map(|point_idx| {
            let half_window = level.min(point_idx).min(last - point_idx);
            if half_window == 0 {
                return data[point_idx];
            }
            weights[half_window]
                .iter()
                .enumerate()
                .map(|(offset, w)| w * data[point_idx + offset - half_window])
                .sum()
        })
        .collect()
}

fn gaussian_smooth(data: &[f64], level: usize) -> Vec<f64> {
    if level == 0 || data.len() < 3 {
        return data.to_vec();
    }
    let sigma = level as f64 / 2.0;
    let kernel: Vec<f64> = (0..=2 * level)
        .map(|position| {
            let distance_from_center = position as f64 - level as f64;
            (-0.5 * (distance_from_center / sigma).powi(2)).exp()
        })
        .collect();
    convolve_normalized(data, &kernel, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METHODS: [SmoothingMethod; 3] = [
        SmoothingMethod::LinearWeightedMovingAverage { level: 2 },
        SmoothingMethod::SavitzkyGolay { level: 2 },
        SmoothingMethod::Gaussian { level: 2 },
    ];

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_constant_trace_is_preserved() {
        let data = vec![5.0; 11];
        for method in ALL_METHODS.iter() {
            assert_close(&apply_smoothing(&data, method), &data);
        }
    }

    #[test]
    fn test_length_is_preserved() {
        let data = vec![1.0, 3.0, 2.0, 8.0, 1.0];
        for method in ALL_METHODS.iter() {
            assert_eq!(apply_smoothing(&data, method).len(), data.len());
        }
        assert!(apply_smoothing(&[], &SmoothingMethod::default()).is_empty());
    }

    #[test]
    fn test_none_and_zero_level_are_identity() {
        let data = vec![1.0, 3.0, 2.0, 8.0, 1.0];
        assert_eq!(apply_smoothing(&data, &SmoothingMethod::None), data);
        let zero = SmoothingMethod::Gaussian { level: 0 };
        assert_eq!(apply_smoothing(&data, &zero), data);
    }

    #[test]
    fn test_linear_weighted_moving_average_values() {
        let data = vec![0.0, 0.0, 4.0, 0.0, 0.0];
        let smoothed = apply_smoothing(
            &data,
            &SmoothingMethod::LinearWeightedMovingAverage { level: 1 },
        );
        // Weights 1 2 1, renormalized at the edges.
        assert_close(&smoothed, &[0.0, 4.0 / 4.0, 8.0 / 4.0, 4.0 / 4.0, 0.0]);
    }

    #[test]
    fn test_savitzky_golay_keeps_quadratics() {
        let data: Vec<f64> = (0..9).map(|x| 2.0 + 0.5 * x as f64 - 0.3 * (x * x) as f64).collect();
        let smoothed = apply_smoothing(&data, &SmoothingMethod::SavitzkyGolay { level: 3 });
        assert_close(&smoothed, &data);
    }

    #[test]
    fn test_savitzky_golay_weights_sum_to_one() {
        for half_window in 1..6 {
            let total: f64 = savitzky_golay_weights(half_window).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smoothing_damps_spikes() {
        let mut data = vec![10.0; 15];
        data[7] = 100.0;
        for method in ALL_METHODS.iter() {
            let smoothed = apply_smoothing(&data, method);
            assert!(smoothed[7] < 100.0, "{:?}", method);
            assert!(smoothed[7] > 10.0, "{:?}", method);
        }
    }
}
