// Choosing which numbers get clustered: the raw channel matrix, a subset of
// its channels picked by a boolean channel annotation, or a stored embedding.

use log::warn;
use ndarray::{s, Array2, Axis};

use crate::container::CellRepository;
use crate::error::{ClusterError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureSelector {
    pub embedding: Option<String>,
    pub n_components: Option<usize>,
    pub channel_mask: Option<String>,
}

impl FeatureSelector {
    /// Cluster on the full channel matrix.
    pub fn all() -> FeatureSelector {
        FeatureSelector::default()
    }

    pub fn use_embedding(mut self, key: &str) -> FeatureSelector {
        self.embedding = Some(key.to_string());
        self
    }

    /// Only use the leading `n` columns of the embedding.
    pub fn n_components(mut self, n: usize) -> FeatureSelector {
        self.n_components = Some(n);
        self
    }

    pub fn use_channel_mask(mut self, column: &str) -> FeatureSelector {
        self.channel_mask = Some(column.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.is_some() && self.channel_mask.is_some() {
            return Err(ClusterError::Configuration(
                "an embedding and a channel mask cannot both be used to select features"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Copy out the matrix to cluster. Never modifies `repo`.
    pub fn resolve<R: CellRepository + ?Sized>(&self, repo: &R) -> Result<Array2<f64>> {
        self.validate()?;

        if self.n_components.is_some() && self.embedding.is_none() {
            warn!("n_components is only used together with an embedding; ignoring it");
        }

        match (&self.embedding, &self.channel_mask) {
            (Some(key), _) => {
                let embedding = repo
                    .embedding(key)
                    .ok_or_else(|| ClusterError::MissingKey {
                        kind: "embedding",
                        key: key.clone(),
                    })?;
                let ncols = self
                    .n_components
                    .map_or(embedding.ncols(), |n| n.min(embedding.ncols()));
                Ok(embedding.slice(s![.., ..ncols]).to_owned())
            }
            (None, Some(key)) => {
                let column = repo
                    .var_column(key)
                    .ok_or_else(|| ClusterError::MissingKey {
                        kind: "channel annotation",
                        key: key.clone(),
                    })?;
                let mask = column.as_bool().ok_or_else(|| ClusterError::ColumnType {
                    column: key.clone(),
                    found: column.dtype(),
                })?;
                let channels = mask
                    .iter()
                    .enumerate()
                    .filter_map(|(j, &keep)| if keep { Some(j) } else { None })
                    .collect::<Vec<_>>();
                Ok(repo.matrix().select(Axis(1), &channels))
            }
            (None, None) => Ok(repo.matrix().to_owned()),
        }
    }
}
