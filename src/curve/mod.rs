//! Derate curve fitting.
//!
//! A derate curve maps a compute-utilization level (SPECint allocation) to a
//! power/performance scaling factor relative to peak. Curves are fit once per
//! component category from sparse empirical sample tables: a flat table
//! short-circuits to a constant, anything else gets a cubic least-squares
//! fit. Fitted curves are valid for extrapolation beyond the sampled range
//! and are never clamped.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A cubic fit has one sample requirement per coefficient.
const MIN_CUBIC_POINTS: usize = 4;

const IDENTITY: DerateCurve = DerateCurve::Constant(1.0);

/// A fitted utilization -> scaling-factor function.
///
/// `Constant(1.0)` is the explicit identity curve used for components with
/// no derating samples in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerateCurve {
    /// Flat line: every utilization maps to the same factor.
    Constant(f64),
    /// Cubic polynomial `a*x^3 + b*x^2 + c*x + d`, coefficients `[a, b, c, d]`.
    Cubic([f64; 4]),
}

impl DerateCurve {
    /// The identity curve (factor 1.0 everywhere).
    pub fn identity() -> Self {
        IDENTITY
    }

    /// Fit a curve to utilization -> factor samples.
    ///
    /// All-equal factors fit a flat line exactly. The short-circuit protects
    /// the least-squares solve from singular systems and keeps extrapolation
    /// flat on flat data. Everything else is a cubic least-squares fit, which
    /// needs at least four distinct utilization points; fewer is a fatal
    /// `CurveFit` error with no fallback.
    pub fn fit(samples: &[(f64, f64)]) -> Result<Self> {
        let first = match samples.first() {
            Some(&(_, y)) => y,
            None => return Err(ModelError::CurveFit("no derating samples".to_string())),
        };
        if samples.iter().all(|&(_, y)| y == first) {
            return Ok(DerateCurve::Constant(first));
        }

        let mut xs: Vec<f64> = samples.iter().map(|&(x, _)| x).collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        if xs.len() < MIN_CUBIC_POINTS {
            return Err(ModelError::CurveFit(format!(
                "cubic fit needs at least {} distinct utilization points, got {}",
                MIN_CUBIC_POINTS,
                xs.len()
            )));
        }

        let mut design = DMatrix::zeros(samples.len(), 4);
        let mut rhs = DVector::zeros(samples.len());
        for (i, &(x, y)) in samples.iter().enumerate() {
            design[(i, 0)] = x * x * x;
            design[(i, 1)] = x * x;
            design[(i, 2)] = x;
            design[(i, 3)] = 1.0;
            rhs[i] = y;
        }
        let svd = design.svd(true, true);
        let coeffs = svd
            .solve(&rhs, f64::EPSILON)
            .map_err(|e| ModelError::CurveFit(e.to_string()))?;
        Ok(DerateCurve::Cubic([coeffs[0], coeffs[1], coeffs[2], coeffs[3]]))
    }

    /// Evaluate the curve at a utilization level. Not clamped; callers may
    /// evaluate outside the sampled range.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            DerateCurve::Constant(c) => *c,
            DerateCurve::Cubic([a, b, c, d]) => ((a * x + b) * x + c) * x + d,
        }
    }
}

/// Fitted curves keyed by component name.
///
/// Lookup for a name with no fitted curve returns the identity, so callers
/// never branch on missing entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurveSet {
    curves: BTreeMap<String, DerateCurve>,
}

impl CurveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, curve: DerateCurve) {
        self.curves.insert(name.into(), curve);
    }

    /// Fit and register a curve for `name`, or register the identity when
    /// the component carries no samples.
    pub fn fit_for(&mut self, name: impl Into<String>, samples: Option<&[(f64, f64)]>) -> Result<()> {
        let curve = match samples {
            Some(s) => DerateCurve::fit(s)?,
            None => DerateCurve::identity(),
        };
        self.insert(name, curve);
        Ok(())
    }

    pub fn get(&self, name: &str) -> &DerateCurve {
        self.curves.get(name).unwrap_or(&IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_samples_fit_constant() {
        let samples = [(0.0, 1.0), (50.0, 1.0), (100.0, 1.0)];
        let curve = DerateCurve::fit(&samples).unwrap();
        assert_eq!(curve, DerateCurve::Constant(1.0));
        // exact everywhere, including outside the sampled range
        assert_eq!(curve.eval(0.0), 1.0);
        assert_eq!(curve.eval(73.5), 1.0);
        assert_eq!(curve.eval(200.0), 1.0);
    }

    #[test]
    fn test_single_sample_fits_constant() {
        let curve = DerateCurve::fit(&[(100.0, 0.8)]).unwrap();
        assert_eq!(curve, DerateCurve::Constant(0.8));
        assert_eq!(curve.eval(-40.0), 0.8);
    }

    #[test]
    fn test_cubic_fit_recovers_polynomial() {
        // y = 0.001x^3 - 0.02x^2 + 0.5x + 2, sampled at 5 points
        let poly = |x: f64| 0.001 * x * x * x - 0.02 * x * x + 0.5 * x + 2.0;
        let samples: Vec<(f64, f64)> =
            [0.0, 25.0, 50.0, 75.0, 100.0].iter().map(|&x| (x, poly(x))).collect();
        let curve = DerateCurve::fit(&samples).unwrap();
        for x in [0.0, 10.0, 60.0, 100.0, 150.0] {
            assert!(
                (curve.eval(x) - poly(x)).abs() < 1e-6,
                "mismatch at {}: {} vs {}",
                x,
                curve.eval(x),
                poly(x)
            );
        }
    }

    #[test]
    fn test_least_squares_over_determined() {
        // 6 noisy-free samples on a line still solve (cubic with a=b=0)
        let samples: Vec<(f64, f64)> = (0..6).map(|i| (i as f64 * 20.0, 0.4 + 0.006 * i as f64 * 20.0)).collect();
        let curve = DerateCurve::fit(&samples).unwrap();
        assert!((curve.eval(50.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_distinct_points_errors() {
        let samples = [(0.0, 0.5), (50.0, 0.8), (100.0, 1.0)];
        assert!(matches!(
            DerateCurve::fit(&samples),
            Err(ModelError::CurveFit(_))
        ));
    }

    #[test]
    fn test_empty_samples_error() {
        assert!(matches!(DerateCurve::fit(&[]), Err(ModelError::CurveFit(_))));
    }

    #[test]
    fn test_curve_set_identity_fallback() {
        let set = CurveSet::new();
        assert_eq!(set.get("anything").eval(42.0), 1.0);
    }

    #[test]
    fn test_curve_set_fit_for() {
        let mut set = CurveSet::new();
        set.fit_for("cpu", Some(&[(0.0, 0.5), (50.0, 0.5), (100.0, 0.5)]))
            .unwrap();
        set.fit_for("nic", None).unwrap();
        assert_eq!(set.get("cpu").eval(100.0), 0.5);
        assert_eq!(set.get("nic").eval(100.0), 1.0);
    }
}
