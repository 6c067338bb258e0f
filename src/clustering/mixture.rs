// Gaussian mixture fitting by hard assignment.
//
// Each step scores every cell against every component, moves cells to their
// best-scoring component, and re-estimates the component means, covariances
// and weights from the new memberships. Iteration stops when no cell changes
// component or the step budget runs out.

use itertools::izip;
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;
use std::str::FromStr;
use std::time::Instant;

use super::assign::{argmax_rows, nearest_center};
use super::backend::{NativeBackend, PartitionBackend};
use super::kmeans::KMeansParams;
use super::linalg::{column_means, invert, sample_covariance};
use super::scoring::{ComponentScorer, SquaredDeviationScorer};
use super::seeded_rng;
use crate::error::{ClusterError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentState {
    Active,
    // Lost all of its cells. Center and covariance are left where they were
    // and the weight is zero, so it can't win any cell back.
    Stale,
}

#[derive(Clone, Debug)]
pub struct MixtureComponent {
    pub center: Array1<f64>,
    pub covariance: Array2<f64>,
    pub weight: f64,
    pub state: ComponentState,
}

/// How the initial component centers are chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum MixtureInit {
    /// Centers from a k-means pass.
    KMeans,
    /// Uniform draws within each feature's observed range.
    Random,
    /// Explicit `k × d` centers.
    Centers(Array2<f64>),
}

impl MixtureInit {
    pub fn name(&self) -> &'static str {
        match self {
            MixtureInit::KMeans => "kmeans",
            MixtureInit::Random => "random",
            MixtureInit::Centers(_) => "explicit",
        }
    }
}

impl FromStr for MixtureInit {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<MixtureInit> {
        match s {
            "kmeans" => Ok(MixtureInit::KMeans),
            "random" => Ok(MixtureInit::Random),
            _ => Err(ClusterError::Configuration(format!(
                "unknown initialization '{}', expected 'kmeans' or 'random'",
                s
            ))),
        }
    }
}

pub struct GaussianMixture<S = SquaredDeviationScorer> {
    n_clusters: usize,
    init: MixtureInit,
    max_steps: usize,
    seed: Option<u64>,
    seeder: Box<dyn PartitionBackend>,
    scorer: S,
}

impl GaussianMixture {
    pub fn params(n_clusters: usize) -> GaussianMixture {
        GaussianMixture {
            n_clusters,
            init: MixtureInit::KMeans,
            max_steps: 100,
            seed: None,
            seeder: Box::new(NativeBackend),
            scorer: SquaredDeviationScorer,
        }
    }
}

impl<S: ComponentScorer> GaussianMixture<S> {
    pub fn init(mut self, init: MixtureInit) -> Self {
        self.init = init;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Backend used for the k-means initialization pass.
    pub fn seeder(mut self, seeder: Box<dyn PartitionBackend>) -> Self {
        self.seeder = seeder;
        self
    }

    pub fn scorer<T: ComponentScorer>(self, scorer: T) -> GaussianMixture<T> {
        GaussianMixture {
            n_clusters: self.n_clusters,
            init: self.init,
            max_steps: self.max_steps,
            seed: self.seed,
            seeder: self.seeder,
            scorer,
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn get_init(&self) -> &MixtureInit {
        &self.init
    }

    pub fn get_max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusterError::Configuration(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if let MixtureInit::Centers(centers) = &self.init {
            if centers.dim() != (self.n_clusters, n_features) {
                return Err(ClusterError::Shape {
                    what: "initial centers",
                    expected: (self.n_clusters, n_features),
                    got: centers.dim(),
                });
            }
        }
        Ok(())
    }

    pub fn fit(&self, x: ArrayView2<f64>) -> Result<MixtureFit> {
        let (n, d) = x.dim();
        if n == 0 || d == 0 {
            return Err(ClusterError::EmptyMatrix { rows: n, cols: d });
        }
        self.validate(d)?;
        let k = self.n_clusters;

        let centers = self.initial_centers(x)?;
        let mut labels = nearest_center(x, centers.view());
        let mut components = initial_components(x, centers, &labels);

        // The candidate buffer starts out as all zeros. With a zero step
        // budget that is what gets returned.
        let mut candidate = Array1::<usize>::zeros(n);
        let mut scores = Array2::<f64>::zeros((n, k));
        let mut steps = 0;
        let mut converged = false;

        while steps < self.max_steps {
            let t0 = Instant::now();
            scores = self.scorer.score(x, &components);
            candidate = argmax_rows(scores.view());
            reestimate(x, &candidate, &mut components);
            steps += 1;
            trace!("mixture step {}: {:?}", steps, t0.elapsed());

            let nchanged = izip!(&labels, &candidate).filter(|(a, b)| a != b).count();
            debug!("mixture step {}: {} cells changed component", steps, nchanged);

            if nchanged == 0 {
                converged = true;
                break;
            }
            labels.assign(&candidate);
        }

        if converged {
            info!("mixture with {} components converged after {} steps", k, steps);
        } else {
            info!(
                "mixture with {} components stopped at the step budget ({}) without converging",
                k, steps
            );
        }

        let fit = MixtureFit {
            labels: candidate,
            components,
            scores,
            steps,
            converged,
        };
        for j in fit.singular_components() {
            warn!(
                "mixture component {} has a singular covariance and scores NaN for every cell",
                j
            );
        }
        Ok(fit)
    }

    fn initial_centers(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        match &self.init {
            MixtureInit::Centers(centers) => Ok(centers.clone()),
            MixtureInit::Random => Ok(random_centers(x, self.n_clusters, self.seed)),
            MixtureInit::KMeans => {
                let mut params = KMeansParams::new(self.n_clusters);
                if let Some(seed) = self.seed {
                    params = params.seed(seed);
                }
                debug!("seeding mixture with {} k-means", self.seeder.name());
                Ok(self.seeder.kmeans(x, &params)?.centers)
            }
        }
    }
}

// Uniform draws between each feature's min and max.
fn random_centers(x: ArrayView2<f64>, k: usize, seed: Option<u64>) -> Array2<f64> {
    let mut rng = seeded_rng(seed);
    let lower = x.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
    let upper = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));

    let mut centers = Array2::<f64>::zeros((k, x.ncols()));
    for mut center in centers.rows_mut() {
        for (c, &lo, &hi) in izip!(center.iter_mut(), &lower, &upper) {
            *c = lo + (hi - lo) * rng.random::<f64>();
        }
    }
    centers
}

// Components start at the given centers, with covariance and weight taken
// from the cells nearest to each center.
fn initial_components(
    x: ArrayView2<f64>,
    centers: Array2<f64>,
    labels: &Array1<usize>,
) -> Vec<MixtureComponent> {
    let n = x.nrows() as f64;
    let d = x.ncols();

    centers
        .outer_iter()
        .enumerate()
        .map(|(j, center)| {
            let members = members_of(labels, j);
            if members.is_empty() {
                warn!("mixture component {} starts out with no cells", j);
                return MixtureComponent {
                    center: center.to_owned(),
                    covariance: Array2::from_elem((d, d), f64::NAN),
                    weight: 0.0,
                    state: ComponentState::Stale,
                };
            }

            let xs = x.select(Axis(0), &members);
            let μ = column_means(xs.view());
            MixtureComponent {
                center: center.to_owned(),
                covariance: sample_covariance(xs.view(), μ.view()),
                weight: members.len() as f64 / n,
                state: ComponentState::Active,
            }
        })
        .collect()
}

fn reestimate(x: ArrayView2<f64>, labels: &Array1<usize>, components: &mut [MixtureComponent]) {
    let n = x.nrows() as f64;
    components
        .par_iter_mut()
        .enumerate()
        .for_each(|(j, component)| {
            let members = members_of(labels, j);
            component.weight = members.len() as f64 / n;

            if members.is_empty() {
                if component.state == ComponentState::Active {
                    warn!("mixture component {} lost all of its cells", j);
                }
                component.state = ComponentState::Stale;
                return;
            }

            let xs = x.select(Axis(0), &members);
            let μ = column_means(xs.view());
            component.covariance = sample_covariance(xs.view(), μ.view());
            component.center = μ;
            component.state = ComponentState::Active;
        });
}

fn members_of(labels: &Array1<usize>, j: usize) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter_map(|(i, &label)| if label == j { Some(i) } else { None })
        .collect()
}

pub struct MixtureFit {
    pub labels: Array1<usize>,
    pub components: Vec<MixtureComponent>,
    /// Final `n × k` component scores.
    pub scores: Array2<f64>,
    /// Steps actually run.
    pub steps: usize,
    /// Whether labels stopped changing before the step budget ran out.
    pub converged: bool,
}

impl MixtureFit {
    pub fn centers(&self) -> Array2<f64> {
        let d = self.components.first().map_or(0, |c| c.center.len());
        let mut centers = Array2::<f64>::zeros((self.components.len(), d));
        for (mut row, component) in centers.rows_mut().into_iter().zip(&self.components) {
            row.assign(&component.center);
        }
        centers
    }

    pub fn weights(&self) -> Array1<f64> {
        self.components.iter().map(|c| c.weight).collect()
    }

    /// Active components whose covariance can't be inverted, typically
    /// because a channel is constant among their cells. They never win a cell.
    pub fn singular_components(&self) -> Vec<usize> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(j, c)| {
                let (_, det) = invert(c.covariance.view());
                if c.state == ComponentState::Active && det == 0.0 {
                    Some(j)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn stale_components(&self) -> Vec<usize> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(j, c)| {
                if c.state == ComponentState::Stale {
                    Some(j)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::scoring::MahalanobisScorer;
    use crate::clustering::testutil::{blobs, same_partition};
    use ndarray::array;

    const BLOB_CENTERS: [[f64; 2]; 3] = [[0.0, 0.0], [12.0, 0.0], [0.0, 12.0]];

    #[test]
    fn test_deterministic_with_explicit_centers() {
        let (x, _) = blobs(&BLOB_CENTERS, 40, 1.0, 7);
        let centers = array![[1.0, 1.0], [8.0, 1.0], [1.0, 8.0]];

        let gmm = GaussianMixture::params(3)
            .init(MixtureInit::Centers(centers))
            .max_steps(50);
        let a = gmm.fit(x.view()).unwrap();
        let b = gmm.fit(x.view()).unwrap();

        assert_eq!(a.labels, b.labels);
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn test_single_component() {
        let (x, _) = blobs(&[[2.0, -1.0], [5.0, 3.0]], 25, 1.5, 11);
        let fit = GaussianMixture::params(1).seed(3).fit(x.view()).unwrap();

        assert_eq!(fit.steps, 1);
        assert!(fit.converged);
        assert!(fit.labels.iter().all(|&l| l == 0));
        assert_eq!(fit.weights(), array![1.0]);

        let μ = column_means(x.view());
        let cov = sample_covariance(x.view(), μ.view());
        let component = &fit.components[0];
        for (a, b) in component.center.iter().zip(μ.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in component.covariance.iter().zip(cov.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_step_budget() {
        let (x, _) = blobs(&BLOB_CENTERS, 10, 0.5, 5);
        let centers = array![[0.0, 0.0], [12.0, 0.0], [0.0, 12.0]];
        let fit = GaussianMixture::params(3)
            .init(MixtureInit::Centers(centers))
            .max_steps(0)
            .fit(x.view())
            .unwrap();

        assert_eq!(fit.steps, 0);
        assert!(!fit.converged);
        assert!(fit.labels.iter().all(|&l| l == 0));
        assert!(fit.scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_step_budget_runs_out() {
        let (x, _) = blobs(&BLOB_CENTERS, 40, 1.0, 7);
        let centers = array![[6.0, 6.0], [7.0, 6.0], [6.0, 7.0]];

        let unlimited = GaussianMixture::params(3)
            .init(MixtureInit::Centers(centers.clone()))
            .fit(x.view())
            .unwrap();
        assert!(unlimited.converged);
        assert!(unlimited.steps > 1);

        let fit = GaussianMixture::params(3)
            .init(MixtureInit::Centers(centers.clone()))
            .max_steps(1)
            .fit(x.view())
            .unwrap();
        assert_eq!(fit.steps, 1);
        assert!(!fit.converged);

        let labels = nearest_center(x.view(), centers.view());
        let components = initial_components(x.view(), centers, &labels);
        let first_pass = argmax_rows(SquaredDeviationScorer.score(x.view(), &components).view());
        assert_eq!(fit.labels, first_pass);
    }

    #[test]
    fn test_constant_channel_is_singular() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [10.0, 5.0], [11.0, 5.0]];
        let fit = GaussianMixture::params(2)
            .init(MixtureInit::Centers(array![[1.5, 5.0], [10.5, 5.0]]))
            .fit(x.view())
            .unwrap();

        assert!(fit.labels.iter().all(|&l| l == 0));
        assert_eq!(fit.singular_components(), vec![0]);
        assert_eq!(fit.stale_components(), vec![1]);
        assert!(fit.scores.iter().all(|s| s.is_nan()));
    }

    #[test]
    fn test_recovers_separated_blobs() {
        let (x, truth) = blobs(&BLOB_CENTERS, 60, 0.8, 42);

        let fit = GaussianMixture::params(3)
            .seed(42)
            .max_steps(100)
            .fit(x.view())
            .unwrap();
        assert!(fit.converged);
        assert!(same_partition(&fit.labels, &truth));

        let fit = GaussianMixture::params(3)
            .seed(42)
            .scorer(MahalanobisScorer)
            .fit(x.view())
            .unwrap();
        assert!(fit.converged);
        assert!(same_partition(&fit.labels, &truth));
    }

    #[test]
    fn test_refit_from_converged_centers() {
        let (x, _) = blobs(&BLOB_CENTERS, 50, 1.0, 9);
        let first = GaussianMixture::params(3).seed(1).fit(x.view()).unwrap();
        assert!(first.converged);

        let second = GaussianMixture::params(3)
            .init(MixtureInit::Centers(first.centers()))
            .fit(x.view())
            .unwrap();
        assert_eq!(second.steps, 1);
        assert_eq!(second.labels, first.labels);
        assert_eq!(
            second.labels,
            nearest_center(x.view(), first.centers().view())
        );
    }

    #[test]
    fn test_random_init_stays_in_bounds() {
        let x = array![[0.0, 10.0], [1.0, 20.0], [2.0, 30.0]];
        let centers = random_centers(x.view(), 4, Some(17));
        assert_eq!(centers.dim(), (4, 2));
        for row in centers.rows() {
            assert!((0.0..=2.0).contains(&row[0]));
            assert!((10.0..=30.0).contains(&row[1]));
        }
        assert_eq!(centers, random_centers(x.view(), 4, Some(17)));
    }

    #[test]
    fn test_stale_component() {
        let (x, _) = blobs(&[[0.0, 0.0]], 30, 1.0, 3);
        let centers = array![[0.0, 0.0], [1000.0, 1000.0]];
        let fit = GaussianMixture::params(2)
            .init(MixtureInit::Centers(centers))
            .fit(x.view())
            .unwrap();

        assert!(fit.labels.iter().all(|&l| l == 0));
        assert_eq!(fit.stale_components(), vec![1]);
        assert_eq!(fit.components[1].weight, 0.0);
        assert_eq!(fit.components[1].center, array![1000.0, 1000.0]);
        assert_eq!(fit.components[0].state, ComponentState::Active);
    }

    #[test]
    fn test_validation() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]];

        let result = GaussianMixture::params(2)
            .init(MixtureInit::Centers(array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]))
            .fit(x.view());
        assert!(matches!(
            result,
            Err(ClusterError::Shape {
                expected: (2, 2),
                got: (2, 3),
                ..
            })
        ));

        assert!(matches!(
            GaussianMixture::params(0).fit(x.view()),
            Err(ClusterError::Configuration(_))
        ));
        assert!(matches!(
            GaussianMixture::params(1).fit(Array2::<f64>::zeros((0, 2)).view()),
            Err(ClusterError::EmptyMatrix { rows: 0, cols: 2 })
        ));
    }

    #[test]
    fn test_parse_init() {
        assert_eq!("kmeans".parse::<MixtureInit>().unwrap(), MixtureInit::KMeans);
        assert_eq!("random".parse::<MixtureInit>().unwrap(), MixtureInit::Random);
        assert!(matches!(
            "gaussian".parse::<MixtureInit>(),
            Err(ClusterError::Configuration(_))
        ));
    }
}
