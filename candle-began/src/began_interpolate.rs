use ndarray::Array1;

/// Spherical linear interpolation between two latent vectors
///
/// Follows the shortest arc on the hypersphere spanned by `low` and `high`;
/// nearly collinear inputs fall back to plain linear interpolation to avoid
/// dividing by sin(omega) ~ 0.
///
/// * `t` - interpolation ratio in [0, 1]
pub fn slerp(t: f32, low: &Array1<f32>, high: &Array1<f32>) -> Array1<f32> {
    let unit_dot = low.dot(high) / (norm(low) * norm(high));
    let omega = unit_dot.clamp(-1.0, 1.0).acos();
    let so = omega.sin();

    if so == 0.0 {
        return low * (1.0 - t) + high * t;
    }
    low * (((1.0 - t) * omega).sin() / so) + high * ((t * omega).sin() / so)
}

/// Slerp applied row-by-row over two batches of latent vectors
pub fn slerp_batch(t: f32, low: &[Array1<f32>], high: &[Array1<f32>]) -> Vec<Array1<f32>> {
    low.iter()
        .zip(high.iter())
        .map(|(a, b)| slerp(t, a, b))
        .collect()
}

/// Evenly spaced interpolation ratios covering [0, 1], used for the
/// ten-step interpolation strips
pub fn sequence_ratios(num_steps: usize) -> Vec<f32> {
    if num_steps < 2 {
        return vec![0.0];
    }
    let denom = (num_steps - 1) as f32;
    (0..num_steps).map(|i| i as f32 / denom).collect()
}

fn norm(v: &Array1<f32>) -> f32 {
    v.dot(v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn endpoints_reproduce_inputs() {
        let a = array![1.0_f32, 0.0, 0.0];
        let b = array![0.0_f32, 1.0, 0.0];

        let at0 = slerp(0.0, &a, &b);
        let at1 = slerp(1.0, &a, &b);
        for i in 0..3 {
            assert_relative_eq!(at0[i], a[i], epsilon = 1e-6);
            assert_relative_eq!(at1[i], b[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn midpoint_of_identical_vectors_is_identity() {
        let a = array![0.3_f32, -1.2, 0.7, 2.0];
        let mid = slerp(0.5, &a, &a);
        for i in 0..a.len() {
            assert_relative_eq!(mid[i], a[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn collinear_inputs_fall_back_to_linear() {
        let a = array![1.0_f32, 1.0];
        let b = &a * 3.0;

        // omega == 0, the spherical formula would divide by zero
        let half = slerp(0.5, &a, &b);
        for i in 0..2 {
            assert!(half[i].is_finite());
            assert_relative_eq!(half[i], 0.5 * a[i] + 0.5 * b[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn midpoint_lies_on_the_bisecting_ray() {
        let a = array![1.0_f32, 0.0];
        let b = array![0.0_f32, 1.0];
        let mid = slerp(0.5, &a, &b);
        assert_relative_eq!(mid[0], mid[1], epsilon = 1e-6);
        // equal-norm endpoints keep the midpoint on the same sphere
        assert_relative_eq!(mid.dot(&mid).sqrt(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn sequence_ratios_span_unit_interval() {
        let ratios = sequence_ratios(10);
        assert_eq!(ratios.len(), 10);
        assert_relative_eq!(ratios[0], 0.0);
        assert_relative_eq!(ratios[9], 1.0);
        for w in ratios.windows(2) {
            assert!(w[0] < w[1]);
        }
    }
}
