// Per-cell, per-component scores used to pick each cell's most likely
// mixture component. Both scorers share
//
//   score = -0.5 * q(x - μ, Σ⁻¹) - 0.5 * ln|Σ| + ln w
//
// and differ only in the quadratic penalty q.

use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use std::fmt::Debug;

use super::linalg::invert;
use super::mixture::MixtureComponent;

pub trait ComponentScorer: Debug + Send + Sync {
    /// Penalty for a deviation `δ = x - μ` given the precision matrix `Σ⁻¹`.
    fn quadratic(&self, δ: ArrayView1<f64>, precision: ArrayView2<f64>) -> f64;

    fn name(&self) -> &'static str;

    /// An `n × k` matrix of scores; larger means more likely.
    fn score(&self, x: ArrayView2<f64>, components: &[MixtureComponent]) -> Array2<f64> {
        let mut scores = Array2::<f64>::zeros((x.nrows(), components.len()));
        for (component, mut column) in components.iter().zip(scores.columns_mut()) {
            let (precision, det) = invert(component.covariance.view());
            let offset = -0.5 * det.ln() + component.weight.ln();
            let μ = component.center.view();

            Zip::from(&mut column)
                .and(x.rows())
                .par_for_each(|s, row| {
                    let δ = &row - &μ;
                    *s = -0.5 * self.quadratic(δ.view(), precision.view()) + offset;
                });
        }
        scores
    }
}

/// Squares each feature's deviation before weighting it by the precision
/// matrix: `q = (δ∘δ)ᵀ Σ⁻¹ 1`. This matches the Mahalanobis distance when Σ
/// is diagonal, but not otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredDeviationScorer;

impl ComponentScorer for SquaredDeviationScorer {
    fn quadratic(&self, δ: ArrayView1<f64>, precision: ArrayView2<f64>) -> f64 {
        δ.mapv(|v| v * v).dot(&precision).sum()
    }

    fn name(&self) -> &'static str {
        "squared_deviation"
    }
}

/// Standard multivariate normal log-density (up to a constant): `q = δᵀ Σ⁻¹ δ`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MahalanobisScorer;

impl ComponentScorer for MahalanobisScorer {
    fn quadratic(&self, δ: ArrayView1<f64>, precision: ArrayView2<f64>) -> f64 {
        δ.dot(&precision.dot(&δ))
    }

    fn name(&self) -> &'static str {
        "mahalanobis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::mixture::ComponentState;
    use ndarray::{array, Array1};

    fn component(center: Array1<f64>, covariance: Array2<f64>, weight: f64) -> MixtureComponent {
        MixtureComponent {
            center,
            covariance,
            weight,
            state: ComponentState::Active,
        }
    }

    #[test]
    fn test_scorers_agree_on_diagonal_covariance() {
        let x = array![[1.0, 2.0], [0.5, -1.0], [3.0, 3.0]];
        let components = vec![
            component(array![0.0, 0.0], array![[2.0, 0.0], [0.0, 0.5]], 0.25),
            component(array![3.0, 3.0], array![[1.0, 0.0], [0.0, 1.0]], 0.75),
        ];

        let a = SquaredDeviationScorer.score(x.view(), &components);
        let b = MahalanobisScorer.score(x.view(), &components);
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-12);
        }

        // x = (1, 2), μ = 0: q = 1/2 + 4/0.5 = 8.5, |Σ| = 1
        let expected = -0.5 * 8.5 - 0.5 * 1.0_f64.ln() + 0.25_f64.ln();
        assert!((a[[0, 0]] - expected).abs() < 1e-12);
        assert_eq!(a[[2, 1]], 0.75_f64.ln());
    }

    #[test]
    fn test_scorers_differ_with_correlation() {
        let precision = array![[2.0, -1.0], [-1.0, 2.0]];
        let δ = array![1.0, 2.0];

        // (1, 4) · P · 1 = (1*2 - 4) + (-1 + 4*2) = 5
        assert_eq!(
            SquaredDeviationScorer.quadratic(δ.view(), precision.view()),
            5.0
        );
        // (1, 2) · P · (1, 2) = 2 - 2 - 2 + 8 = 6
        assert_eq!(MahalanobisScorer.quadratic(δ.view(), precision.view()), 6.0);
    }

    #[test]
    fn test_empty_component_never_wins() {
        let x = array![[0.0], [1.0]];
        let components = vec![
            component(array![0.5], array![[1.0]], 1.0),
            component(array![0.5], array![[1.0]], 0.0),
            component(array![0.5], array![[f64::NAN]], 0.5),
        ];
        let scores = SquaredDeviationScorer.score(x.view(), &components);
        assert!(scores.column(0).iter().all(|s| s.is_finite()));
        assert!(scores.column(1).iter().all(|&s| s == f64::NEG_INFINITY));
        assert!(scores.column(2).iter().all(|s| s.is_nan()));
    }
}
