// Lloyd's k-means with k-means++ or random seeding, keeping the best of
// several restarts.

use clap::ValueEnum;
use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::Rng;
use serde::Serialize;

use super::assign::{argmin_distance, nearest_center, squared_distance};
use super::seeded_rng;
use crate::error::{ClusterError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
pub enum KMeansInit {
    #[serde(rename = "k-means++")]
    #[value(name = "k-means++")]
    KMeansPlusPlus,
    #[serde(rename = "random")]
    Random,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub init: KMeansInit,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: Option<u64>,
}

impl KMeansParams {
    pub fn new(n_clusters: usize) -> KMeansParams {
        KMeansParams {
            n_clusters,
            init: KMeansInit::KMeansPlusPlus,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: None,
        }
    }

    pub fn init(mut self, init: KMeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self, n_obs: usize) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusterError::Configuration(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if self.n_init == 0 {
            return Err(ClusterError::Configuration(
                "n_init must be at least 1".to_string(),
            ));
        }
        if self.n_clusters > n_obs {
            return Err(ClusterError::Configuration(format!(
                "n_clusters ({}) is larger than the number of cells ({})",
                self.n_clusters, n_obs
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct KMeansFit {
    pub labels: Array1<usize>,
    pub centers: Array2<f64>,
    /// Sum of squared distances from each cell to its center.
    pub inertia: f64,
    /// Iterations of the best run, when the backend reports them.
    pub n_iter: Option<usize>,
}

pub fn kmeans(x: ArrayView2<f64>, params: &KMeansParams) -> Result<KMeansFit> {
    let (n, d) = x.dim();
    if n == 0 || d == 0 {
        return Err(ClusterError::EmptyMatrix { rows: n, cols: d });
    }
    params.validate(n)?;

    // tolerance is relative to the average feature variance
    let tol = params.tolerance * x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);

    let mut rng = seeded_rng(params.seed);
    let mut best: Option<KMeansFit> = None;
    for run in 0..params.n_init {
        let centers = match params.init {
            KMeansInit::KMeansPlusPlus => kmeans_plus_plus(x, params.n_clusters, &mut rng),
            KMeansInit::Random => random_rows(x, params.n_clusters, &mut rng),
        };
        let fit = lloyd(x, centers, params.max_iter, tol);
        trace!("k-means run {}: inertia {}", run, fit.inertia);

        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    let best = best.ok_or_else(|| {
        ClusterError::Configuration("n_init must be at least 1".to_string())
    })?;
    debug!(
        "k-means with {} clusters: inertia {} after {:?} iterations",
        params.n_clusters, best.inertia, best.n_iter
    );
    Ok(best)
}

// Run k-means once per entry of `ks`, returning the inertia of each.
pub fn inertia_sweep(
    x: ArrayView2<f64>,
    ks: &[usize],
    params: &KMeansParams,
    fit: impl Fn(ArrayView2<f64>, &KMeansParams) -> Result<KMeansFit>,
) -> Result<Vec<f64>> {
    ks.iter()
        .map(|&k| {
            let mut params = params.clone();
            params.n_clusters = k;
            Ok(fit(x, &params)?.inertia)
        })
        .collect()
}

fn lloyd(x: ArrayView2<f64>, mut centers: Array2<f64>, max_iter: usize, tol: f64) -> KMeansFit {
    let k = centers.nrows();
    let mut n_iter = 0;

    for _ in 0..max_iter {
        let labels = nearest_center(x, centers.view());
        n_iter += 1;

        let mut sums = Array2::<f64>::zeros(centers.dim());
        let mut counts = vec![0_usize; k];
        for (row, &label) in x.rows().into_iter().zip(&labels) {
            sums.row_mut(label).scaled_add(1.0, &row);
            counts[label] += 1;
        }

        let mut shift = 0.0;
        for (j, &count) in counts.iter().enumerate() {
            // empty clusters keep their previous center
            if count == 0 {
                continue;
            }
            let center = sums.row(j).mapv(|v| v / count as f64);
            shift += squared_distance(center.view(), centers.row(j));
            centers.row_mut(j).assign(&center);
        }

        if shift <= tol {
            break;
        }
    }

    let mut labels = Array1::<usize>::zeros(x.nrows());
    let mut distances = Array1::<f64>::zeros(x.nrows());
    Zip::from(&mut labels)
        .and(&mut distances)
        .and(x.rows())
        .par_for_each(|label, distance, row| {
            (*label, *distance) = argmin_distance(row, centers.view());
        });

    KMeansFit {
        labels,
        centers,
        inertia: distances.sum(),
        n_iter: Some(n_iter),
    }
}

fn random_rows(x: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let rows = sample(rng, x.nrows(), k).into_vec();
    x.select(Axis(0), &rows)
}

// Each new center is drawn with probability proportional to its squared
// distance from the nearest center picked so far.
fn kmeans_plus_plus(x: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut rows = Vec::with_capacity(k);
    rows.push(rng.random_range(0..n));

    let mut d2 = Array1::<f64>::from_elem(n, f64::INFINITY);
    while rows.len() < k {
        let last = x.row(rows[rows.len() - 1]);
        Zip::from(&mut d2).and(x.rows()).for_each(|d, row| {
            *d = d.min(squared_distance(row, last));
        });

        let next = match WeightedIndex::new(d2.iter().copied()) {
            Ok(dist) => dist.sample(rng),
            // every remaining cell coincides with a center
            Err(_) => rng.random_range(0..n),
        };
        rows.push(next);
    }

    x.select(Axis(0), &rows)
}
