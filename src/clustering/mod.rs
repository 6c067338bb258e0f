pub mod assign;
pub mod backend;
pub mod hierarchical;
pub mod kmeans;
pub mod linalg;
pub mod mixture;
pub mod record;
pub mod scoring;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use backend::{HierarchicalBackend, LinfaBackend, NativeBackend, PartitionBackend};
pub use hierarchical::{AgglomerativeParams, HierarchicalFit, Linkage, Metric};
pub use kmeans::{KMeansFit, KMeansInit, KMeansParams};
pub use mixture::{ComponentState, GaussianMixture, MixtureComponent, MixtureFit, MixtureInit};
pub use record::{AgglomerativeRecord, ClusterRecord, InitRecord, KMeansRecord, MixtureRecord};
pub use scoring::{ComponentScorer, MahalanobisScorer, SquaredDeviationScorer};

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
