// Metadata kept alongside each clustering's labels in the results store.

use ndarray::{Array1, Array2};
use serde::Serialize;

use super::hierarchical::{AgglomerativeParams, HierarchicalFit};
use super::kmeans::{KMeansFit, KMeansParams};
use super::mixture::{MixtureFit, MixtureInit};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClusterRecord {
    Mixture(MixtureRecord),
    #[serde(rename = "kmeans")]
    KMeans(KMeansRecord),
    Agglomerative(AgglomerativeRecord),
}

/// How a mixture was initialized: the mode name, or the centers themselves
/// when they were given explicitly.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InitRecord {
    Mode(String),
    Centers(Array2<f64>),
}

impl From<&MixtureInit> for InitRecord {
    fn from(init: &MixtureInit) -> InitRecord {
        match init {
            MixtureInit::Centers(centers) => InitRecord::Centers(centers.clone()),
            _ => InitRecord::Mode(init.name().to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MixtureRecord {
    pub n_clusters: usize,
    pub max_steps: usize,
    pub steps_before_convergence: usize,
    pub converged: bool,
    pub initialization: InitRecord,
    pub scorer: String,
    /// Final per-cell, per-component scores (`n × k`), not mixing weights.
    pub scores: Array2<f64>,
    /// Mixing weights, one per component.
    pub weights: Array1<f64>,
    pub stale_components: Vec<usize>,
}

impl MixtureRecord {
    pub fn new(
        fit: &MixtureFit,
        n_clusters: usize,
        max_steps: usize,
        init: &MixtureInit,
        scorer: &str,
    ) -> MixtureRecord {
        MixtureRecord {
            n_clusters,
            max_steps,
            steps_before_convergence: fit.steps,
            converged: fit.converged,
            initialization: InitRecord::from(init),
            scorer: scorer.to_string(),
            scores: fit.scores.clone(),
            weights: fit.weights(),
            stale_components: fit.stale_components(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct KMeansRecord {
    pub backend: String,
    pub params: KMeansParams,
    pub cluster_centers: Array2<f64>,
    pub inertia: f64,
    pub n_iter: Option<usize>,
}

impl KMeansRecord {
    pub fn new(fit: &KMeansFit, params: &KMeansParams, backend: &str) -> KMeansRecord {
        KMeansRecord {
            backend: backend.to_string(),
            params: params.clone(),
            cluster_centers: fit.centers.clone(),
            inertia: fit.inertia,
            n_iter: fit.n_iter,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AgglomerativeRecord {
    pub params: AgglomerativeParams,
    pub n_clusters: usize,
    pub n_leaves: usize,
    pub n_connected_components: usize,
    pub children: Vec<[usize; 2]>,
    pub distances: Vec<f64>,
}

impl AgglomerativeRecord {
    pub fn new(fit: &HierarchicalFit, params: &AgglomerativeParams) -> AgglomerativeRecord {
        AgglomerativeRecord {
            params: params.clone(),
            n_clusters: fit.n_clusters,
            n_leaves: fit.n_leaves,
            n_connected_components: fit.n_connected_components,
            children: fit.children.clone(),
            distances: fit.distances.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_init_record() {
        assert_eq!(
            InitRecord::from(&MixtureInit::KMeans),
            InitRecord::Mode("kmeans".to_string())
        );
        let centers = array![[0.0, 1.0]];
        assert_eq!(
            InitRecord::from(&MixtureInit::Centers(centers.clone())),
            InitRecord::Centers(centers)
        );
    }

    #[test]
    fn test_json_layout() {
        let record = ClusterRecord::KMeans(KMeansRecord {
            backend: "native".to_string(),
            params: KMeansParams::new(2),
            cluster_centers: array![[0.0], [1.0]],
            inertia: 0.5,
            n_iter: Some(3),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["method"], "kmeans");
        assert_eq!(value["params"]["init"], "k-means++");
        assert_eq!(value["n_iter"], 3);
    }
}
