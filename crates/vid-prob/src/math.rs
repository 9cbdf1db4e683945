//! Small numeric utilities shared by the engine: grids, the trapezoid rule,
//! linear interpolation and the Dawson integral.

use std::f64::consts::PI;

/// `n` evenly spaced points on `[a, b]` (both ends included).
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            // Pin the last point so callers can rely on exact end values.
            (0..n).map(|i| if i == n - 1 { b } else { a + step * i as f64 }).collect()
        }
    }
}

/// `n` logarithmically spaced points on `[a, b]`, `a, b > 0`.
pub fn geomspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    let (la, lb) = (a.log10(), b.log10());
    linspace(la, lb, n)
        .into_iter()
        .enumerate()
        .map(|(i, x)| if i == 0 { a } else if i + 1 == n { b } else { 10f64.powf(x) })
        .collect()
}

/// Arithmetic midpoints of consecutive edges.
pub fn bin_centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

/// Trapezoid integral of samples `y` at abscissae `x`.
pub fn trapz(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.windows(2).zip(y.windows(2)).map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1])).sum()
}

/// Trapezoid weights: `Σ w_i y_i == trapz(x, y)` for any `y`.
pub fn trapz_weights(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut w = vec![0.0; n];
    for i in 1..n {
        let half = 0.5 * (x[i] - x[i - 1]);
        w[i - 1] += half;
        w[i] += half;
    }
    w
}

/// Piecewise-linear interpolation on increasing `xs`.
///
/// Returns `fill` outside `[xs[0], xs[n-1]]`.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64, fill: f64) -> f64 {
    let n = xs.len();
    if n == 0 || x < xs[0] || x > xs[n - 1] || x.is_nan() {
        return fill;
    }
    if n == 1 {
        return ys[0];
    }
    // Index of the first knot strictly greater than x, clamped to a valid segment.
    let hi = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// `sin(x)/x` with the removable singularity filled.
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        let x2 = x * x;
        1.0 - x2 / 6.0 + x2 * x2 / 120.0
    } else {
        x.sin() / x
    }
}

/// Dawson's integral `D(x) = exp(-x²) ∫_0^x exp(t²) dt`.
///
/// Rybicki's method (sampling theorem with a Gaussian sum), accurate to about
/// 2e-7 relative; a Taylor series is used for `|x| < 0.2`.
pub fn dawson(x: f64) -> f64 {
    const H: f64 = 0.4;
    const A1: f64 = 2.0 / 3.0;
    const A2: f64 = 0.4;
    const A3: f64 = 2.0 / 7.0;
    const NMAX: usize = 6;

    if x.abs() < 0.2 {
        let x2 = x * x;
        return x * (1.0 - A1 * x2 * (1.0 - A2 * x2 * (1.0 - A3 * x2)));
    }

    let xx = x.abs();
    let n0 = 2.0 * (0.5 * xx / H + 0.5).floor();
    let xp = xx - n0 * H;
    let mut e1 = (2.0 * xp * H).exp();
    let e2 = e1 * e1;
    let mut d1 = n0 + 1.0;
    let mut d2 = d1 - 2.0;
    let mut sum = 0.0;
    for i in 0..NMAX {
        let c = (-((2 * i + 1) as f64 * H).powi(2)).exp();
        sum += c * (e1 / d1 + 1.0 / (d2 * e1));
        d1 += 2.0;
        d2 -= 2.0;
        e1 *= e2;
    }
    (1.0 / PI.sqrt()) * x.signum() * (-xp * xp).exp() * sum
}

/// `D(x) / x`, finite at the origin where it tends to 1.
pub fn dawson_over_x(x: f64) -> f64 {
    if x.abs() < 1e-3 {
        let x2 = x * x;
        1.0 - 2.0 * x2 / 3.0 + 4.0 * x2 * x2 / 15.0
    } else {
        dawson(x) / x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-1.0, 3.0, 5);
        assert_eq!(v, vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_geomspace_is_geometric() {
        let v = geomspace(1e-2, 1e2, 5);
        assert_eq!(v[0], 1e-2);
        assert_eq!(v[4], 1e2);
        for w in v.windows(2) {
            assert_relative_eq!(w[1] / w[0], 10.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_trapz_weights_match_trapz() {
        let x = geomspace(0.1, 10.0, 37);
        let y: Vec<f64> = x.iter().map(|v| v.sin() + v * v).collect();
        let w = trapz_weights(&x);
        let via_w: f64 = w.iter().zip(&y).map(|(a, b)| a * b).sum();
        assert_relative_eq!(via_w, trapz(&x, &y), epsilon = 1e-12);
    }

    #[test]
    fn test_interp_linear_fill_and_knots() {
        let xs = [0.0, 1.0, 3.0];
        let ys = [0.0, 2.0, 6.0];
        assert_eq!(interp_linear(&xs, &ys, -0.5, 9.0), 9.0);
        assert_eq!(interp_linear(&xs, &ys, 3.5, 9.0), 9.0);
        assert_relative_eq!(interp_linear(&xs, &ys, 1.0, 0.0), 2.0);
        assert_relative_eq!(interp_linear(&xs, &ys, 2.0, 0.0), 4.0);
        assert_relative_eq!(interp_linear(&xs, &ys, 3.0, 0.0), 6.0);
    }

    #[test]
    fn test_dawson_reference_values() {
        // D(x) from tables (Abramowitz & Stegun 7.1).
        assert_relative_eq!(dawson(0.1), 0.099_335_992_397_852_9, epsilon = 1e-6);
        assert_relative_eq!(dawson(0.5), 0.424_436_383_502_022_3, epsilon = 1e-6);
        assert_relative_eq!(dawson(0.924_138_873_004_591_8), 0.541_044_224_635_181_7, epsilon = 1e-6);
        assert_relative_eq!(dawson(2.0), 0.301_340_388_923_810_7, epsilon = 1e-6);
        assert_relative_eq!(dawson(10.0), 0.050_253_847_316_531_5, epsilon = 1e-6);
        assert_relative_eq!(dawson(-0.5), -dawson(0.5), epsilon = 1e-15);
    }

    #[test]
    fn test_dawson_over_x_continuous_at_zero() {
        assert_eq!(dawson_over_x(0.0), 1.0);
        assert_relative_eq!(dawson_over_x(1e-3 - 1e-12), dawson_over_x(1e-3 + 1e-12), epsilon = 1e-7);
        assert_relative_eq!(dawson_over_x(0.5), dawson(0.5) / 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_sinc() {
        assert_eq!(sinc(0.0), 1.0);
        assert_relative_eq!(sinc(PI), 0.0, epsilon = 1e-15);
        assert_relative_eq!(sinc(1e-5), (1e-5f64).sin() / 1e-5, epsilon = 1e-15);
    }
}
