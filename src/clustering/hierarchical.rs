// Agglomerative clustering over a dense distance matrix, merging the closest
// pair of clusters and updating distances with the Lance-Williams recurrence.
// Quadratic memory and cubic time, so only suitable for subsampled data.

use clap::ValueEnum;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::Serialize;

use super::assign::squared_distance;
use crate::error::{ClusterError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    Ward,
    Complete,
    Average,
    Single,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Euclidean,
    Manhattan,
    Cosine,
}

impl Metric {
    fn distance(self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            Metric::Euclidean => squared_distance(a, b).sqrt(),
            Metric::Manhattan => a.iter().zip(b.iter()).map(|(u, v)| (u - v).abs()).sum(),
            Metric::Cosine => {
                let norm = (a.dot(&a) * b.dot(&b)).sqrt();
                if norm == 0.0 {
                    1.0
                } else {
                    1.0 - a.dot(&b) / norm
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgglomerativeParams {
    pub n_clusters: Option<usize>,
    pub distance_threshold: Option<f64>,
    pub linkage: Linkage,
    pub metric: Metric,
}

impl AgglomerativeParams {
    pub fn n_clusters(n_clusters: usize) -> AgglomerativeParams {
        AgglomerativeParams {
            n_clusters: Some(n_clusters),
            distance_threshold: None,
            linkage: Linkage::Ward,
            metric: Metric::Euclidean,
        }
    }

    pub fn distance_threshold(threshold: f64) -> AgglomerativeParams {
        AgglomerativeParams {
            n_clusters: None,
            distance_threshold: Some(threshold),
            linkage: Linkage::Ward,
            metric: Metric::Euclidean,
        }
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn validate(&self, n_obs: usize) -> Result<()> {
        match (self.n_clusters, self.distance_threshold) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(ClusterError::Configuration(
                    "exactly one of n_clusters and distance_threshold has to be set".to_string(),
                ));
            }
            (Some(k), None) if k == 0 || k > n_obs => {
                return Err(ClusterError::Configuration(format!(
                    "n_clusters must be between 1 and the number of cells ({}), got {}",
                    n_obs, k
                )));
            }
            (None, Some(t)) if !(t >= 0.0 && t.is_finite()) => {
                return Err(ClusterError::Configuration(format!(
                    "distance_threshold must be a non-negative number, got {}",
                    t
                )));
            }
            _ => {}
        }
        if self.linkage == Linkage::Ward && self.metric != Metric::Euclidean {
            return Err(ClusterError::Configuration(format!(
                "{:?} metric is not supported with ward linkage",
                self.metric
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct HierarchicalFit {
    pub labels: Array1<usize>,
    pub n_clusters: usize,
    pub n_leaves: usize,
    pub n_connected_components: usize,
    /// Merge tree. Leaves are nodes `0..n`, merge `s` creates node `n + s`.
    pub children: Vec<[usize; 2]>,
    pub distances: Vec<f64>,
}

pub fn agglomerative(x: ArrayView2<f64>, params: &AgglomerativeParams) -> Result<HierarchicalFit> {
    let (n, d) = x.dim();
    if n == 0 || d == 0 {
        return Err(ClusterError::EmptyMatrix { rows: n, cols: d });
    }
    params.validate(n)?;

    let (children, distances) = merge_tree(x, params.linkage, params.metric);

    let nmerges = match (params.n_clusters, params.distance_threshold) {
        (Some(k), _) => n - k,
        (None, Some(t)) => distances.iter().take_while(|&&dist| dist < t).count(),
        (None, None) => 0,
    };
    let labels = cut_tree(n, &children[..nmerges]);
    debug!(
        "agglomerative clustering ({:?} linkage): {} cells into {} clusters",
        params.linkage,
        n,
        n - nmerges
    );

    Ok(HierarchicalFit {
        labels,
        n_clusters: n - nmerges,
        n_leaves: n,
        n_connected_components: 1,
        children,
        distances,
    })
}

fn merge_tree(x: ArrayView2<f64>, linkage: Linkage, metric: Metric) -> (Vec<[usize; 2]>, Vec<f64>) {
    let n = x.nrows();
    let mut dist = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dij = metric.distance(x.row(i), x.row(j));
            dist[[i, j]] = dij;
            dist[[j, i]] = dij;
        }
    }

    let mut active = vec![true; n];
    let mut size = vec![1_usize; n];
    let mut node = (0..n).collect::<Vec<_>>();
    let mut children = Vec::with_capacity(n.saturating_sub(1));
    let mut distances = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if active[j] && best.map_or(true, |(_, _, b)| dist[[i, j]] < b) {
                    best = Some((i, j, dist[[i, j]]));
                }
            }
        }
        let Some((i, j, dij)) = best else {
            break;
        };

        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let dik = dist[[i, k]];
            let djk = dist[[j, k]];
            let (ni, nj, nk) = (size[i] as f64, size[j] as f64, size[k] as f64);
            let dnew = match linkage {
                Linkage::Single => dik.min(djk),
                Linkage::Complete => dik.max(djk),
                Linkage::Average => (ni * dik + nj * djk) / (ni + nj),
                Linkage::Ward => (((ni + nk) * dik * dik + (nj + nk) * djk * djk
                    - nk * dij * dij)
                    / (ni + nj + nk))
                    .max(0.0)
                    .sqrt(),
            };
            dist[[i, k]] = dnew;
            dist[[k, i]] = dnew;
        }

        let (a, b) = (node[i].min(node[j]), node[i].max(node[j]));
        children.push([a, b]);
        distances.push(dij);

        size[i] += size[j];
        active[j] = false;
        node[i] = n + step;
    }

    (children, distances)
}

// Apply the given merges and number the resulting clusters in order of
// their lowest-indexed cell.
fn cut_tree(n: usize, merges: &[[usize; 2]]) -> Array1<usize> {
    let mut parent = vec![usize::MAX; n + merges.len()];
    for (s, &[a, b]) in merges.iter().enumerate() {
        parent[a] = n + s;
        parent[b] = n + s;
    }

    let mut root_label = vec![usize::MAX; n + merges.len()];
    let mut nlabels = 0;
    let mut labels = Array1::<usize>::zeros(n);
    for (i, label) in labels.iter_mut().enumerate() {
        let mut root = i;
        while parent[root] != usize::MAX {
            root = parent[root];
        }
        if root_label[root] == usize::MAX {
            root_label[root] = nlabels;
            nlabels += 1;
        }
        *label = root_label[root];
    }
    labels
}
