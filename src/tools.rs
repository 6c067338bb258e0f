// Clustering entry points that work on a whole dataset: resolve the
// features, fit, then store labels and metadata under the caller's key.
// Every failure happens before the dataset is touched.

use log::info;
use std::time::Instant;

use crate::clustering::{
    AgglomerativeParams, AgglomerativeRecord, ClusterRecord, ComponentScorer, GaussianMixture,
    HierarchicalBackend, HierarchicalFit, KMeansFit, KMeansParams, KMeansRecord, MixtureFit,
    MixtureRecord, PartitionBackend,
};
use crate::container::{CellRepository, Column};
use crate::error::Result;
use crate::features::FeatureSelector;

/// Fit a gaussian mixture, writing per-cell labels to the `key_added` cell
/// annotation column and a [`MixtureRecord`] to the results store.
pub fn fit_mixture<R, S>(
    repo: &mut R,
    gmm: &GaussianMixture<S>,
    key_added: &str,
    features: &FeatureSelector,
) -> Result<MixtureFit>
where
    R: CellRepository + ?Sized,
    S: ComponentScorer,
{
    let t0 = Instant::now();
    let x = features.resolve(&*repo)?;
    let fit = gmm.fit(x.view())?;

    repo.set_obs_column(key_added, Column::from_labels(&fit.labels))?;
    repo.set_result(
        key_added,
        ClusterRecord::Mixture(MixtureRecord::new(
            &fit,
            gmm.n_clusters(),
            gmm.get_max_steps(),
            gmm.get_init(),
            gmm.scorer_name(),
        )),
    );
    info!(
        "mixture clustering of {} cells stored under '{}' ({:?})",
        x.nrows(),
        key_added,
        t0.elapsed()
    );
    Ok(fit)
}

pub fn fit_kmeans<R: CellRepository + ?Sized>(
    repo: &mut R,
    backend: &dyn PartitionBackend,
    params: &KMeansParams,
    key_added: &str,
    features: &FeatureSelector,
) -> Result<KMeansFit> {
    let t0 = Instant::now();
    let x = features.resolve(&*repo)?;
    let fit = backend.kmeans(x.view(), params)?;

    repo.set_obs_column(key_added, Column::from_labels(&fit.labels))?;
    repo.set_result(
        key_added,
        ClusterRecord::KMeans(KMeansRecord::new(&fit, params, backend.name())),
    );
    info!(
        "k-means clustering of {} cells stored under '{}' ({:?})",
        x.nrows(),
        key_added,
        t0.elapsed()
    );
    Ok(fit)
}

pub fn fit_agglomerative<R: CellRepository + ?Sized>(
    repo: &mut R,
    backend: &dyn HierarchicalBackend,
    params: &AgglomerativeParams,
    key_added: &str,
    features: &FeatureSelector,
) -> Result<HierarchicalFit> {
    let t0 = Instant::now();
    let x = features.resolve(&*repo)?;
    let fit = backend.agglomerative(x.view(), params)?;

    repo.set_obs_column(key_added, Column::from_labels(&fit.labels))?;
    repo.set_result(
        key_added,
        ClusterRecord::Agglomerative(AgglomerativeRecord::new(&fit, params)),
    );
    info!(
        "agglomerative clustering of {} cells into {} clusters stored under '{}' ({:?})",
        x.nrows(),
        fit.n_clusters,
        key_added,
        t0.elapsed()
    );
    Ok(fit)
}

/// K-means inertia for each of `ks`. Leaves the dataset untouched.
pub fn kmeans_inertias<R: CellRepository + ?Sized>(
    repo: &R,
    backend: &dyn PartitionBackend,
    ks: &[usize],
    params: &KMeansParams,
    features: &FeatureSelector,
) -> Result<Vec<f64>> {
    let x = features.resolve(&*repo)?;
    backend.inertias(x.view(), ks, params)
}
