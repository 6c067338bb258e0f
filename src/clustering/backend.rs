// Partition and hierarchical clustering backends. The native backend runs
// the implementations in this crate; the linfa backend hands k-means off to
// linfa-clustering.

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::{KMeans, KMeansInit as LinfaKMeansInit};
use log::debug;
use ndarray::{Array1, ArrayView2};

use super::hierarchical::{agglomerative, AgglomerativeParams, HierarchicalFit};
use super::kmeans::{inertia_sweep, kmeans, KMeansFit, KMeansInit, KMeansParams};
use crate::error::Result;

pub trait PartitionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn kmeans(&self, x: ArrayView2<f64>, params: &KMeansParams) -> Result<KMeansFit>;

    /// Inertia for each requested cluster count.
    fn inertias(&self, x: ArrayView2<f64>, ks: &[usize], params: &KMeansParams) -> Result<Vec<f64>> {
        inertia_sweep(x, ks, params, |x, params| self.kmeans(x, params))
    }
}

pub trait HierarchicalBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn agglomerative(
        &self,
        x: ArrayView2<f64>,
        params: &AgglomerativeParams,
    ) -> Result<HierarchicalFit>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl PartitionBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn kmeans(&self, x: ArrayView2<f64>, params: &KMeansParams) -> Result<KMeansFit> {
        kmeans(x, params)
    }
}

impl HierarchicalBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn agglomerative(
        &self,
        x: ArrayView2<f64>,
        params: &AgglomerativeParams,
    ) -> Result<HierarchicalFit> {
        agglomerative(x, params)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinfaBackend;

impl PartitionBackend for LinfaBackend {
    fn name(&self) -> &'static str {
        "linfa"
    }

    // linfa seeds its own generator, so `params.seed` is not forwarded.
    fn kmeans(&self, x: ArrayView2<f64>, params: &KMeansParams) -> Result<KMeansFit> {
        if params.seed.is_some() {
            debug!("linfa k-means uses its own fixed seed; ignoring the requested one");
        }
        let init = match params.init {
            KMeansInit::KMeansPlusPlus => LinfaKMeansInit::KMeansPlusPlus,
            KMeansInit::Random => LinfaKMeansInit::Random,
        };

        let dataset = DatasetBase::from(x.to_owned());
        let model = KMeans::params(params.n_clusters)
            .n_runs(params.n_init)
            .max_n_iterations(params.max_iter as u64)
            .tolerance(params.tolerance)
            .init_method(init)
            .fit(&dataset)?;

        let labels: Array1<usize> = model.predict(&x);
        Ok(KMeansFit {
            labels,
            centers: model.centroids().to_owned(),
            inertia: model.inertia(),
            n_iter: None,
        })
    }
}
