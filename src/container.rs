// Host container holding the cell-by-channel matrix and everything hung off
// of it: per-cell and per-channel annotation columns, named embeddings, and
// clustering records keyed by the name the caller chose.

use ndarray::{Array1, Array2, ArrayView2};
use std::collections::HashMap;

use crate::clustering::record::ClusterRecord;
use crate::error::{ClusterError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Bool(Array1<bool>),
    Int(Array1<i64>),
    Float(Array1<f64>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Bool(_) => "bool",
            Column::Int(_) => "int",
            Column::Float(_) => "float",
            Column::Str(_) => "str",
        }
    }

    pub fn as_bool(&self) -> Option<&Array1<bool>> {
        match self {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&Array1<i64>> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn from_labels(labels: &Array1<usize>) -> Column {
        Column::Int(labels.mapv(|l| l as i64))
    }
}

/// Read and write access to a cell dataset.
///
/// The clustering entry points in [`crate::tools`] only talk to the data
/// through this trait, so anything that can hand out a matrix view and
/// accept label columns and records can be clustered.
pub trait CellRepository {
    fn n_obs(&self) -> usize;
    fn n_vars(&self) -> usize;

    /// Primary cell-by-channel matrix.
    fn matrix(&self) -> ArrayView2<'_, f64>;

    fn embedding(&self, key: &str) -> Option<ArrayView2<'_, f64>>;
    fn var_column(&self, key: &str) -> Option<&Column>;
    fn obs_column(&self, key: &str) -> Option<&Column>;

    /// Insert or overwrite a per-cell column. Fails if its length is not `n_obs`.
    fn set_obs_column(&mut self, key: &str, column: Column) -> Result<()>;

    fn result(&self, key: &str) -> Option<&ClusterRecord>;
    fn set_result(&mut self, key: &str, record: ClusterRecord);
}

pub struct CellData {
    x: Array2<f64>,
    var_names: Vec<String>,
    obs: HashMap<String, Column>,
    var: HashMap<String, Column>,
    obsm: HashMap<String, Array2<f64>>,
    uns: HashMap<String, ClusterRecord>,
}

impl CellData {
    pub fn new(x: Array2<f64>) -> CellData {
        let var_names = (0..x.ncols()).map(|j| format!("ch{}", j)).collect();
        CellData {
            x,
            var_names,
            obs: HashMap::new(),
            var: HashMap::new(),
            obsm: HashMap::new(),
            uns: HashMap::new(),
        }
    }

    pub fn with_var_names(x: Array2<f64>, var_names: Vec<String>) -> Result<CellData> {
        if var_names.len() != x.ncols() {
            return Err(ClusterError::Length {
                what: "channel names",
                expected: x.ncols(),
                got: var_names.len(),
            });
        }
        let mut data = CellData::new(x);
        data.var_names = var_names;
        Ok(data)
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn insert_var_column(&mut self, key: &str, column: Column) -> Result<()> {
        if column.len() != self.x.ncols() {
            return Err(ClusterError::Length {
                what: "channel annotation column",
                expected: self.x.ncols(),
                got: column.len(),
            });
        }
        self.var.insert(key.to_string(), column);
        Ok(())
    }

    pub fn insert_embedding(&mut self, key: &str, embedding: Array2<f64>) -> Result<()> {
        if embedding.nrows() != self.x.nrows() {
            return Err(ClusterError::Length {
                what: "embedding",
                expected: self.x.nrows(),
                got: embedding.nrows(),
            });
        }
        self.obsm.insert(key.to_string(), embedding);
        Ok(())
    }

    /// Mark the named channels with a boolean column, for use as a channel mask.
    pub fn insert_channel_mask(&mut self, key: &str, channels: &[String]) -> Result<()> {
        for channel in channels {
            if !self.var_names.contains(channel) {
                return Err(ClusterError::MissingKey {
                    kind: "channel",
                    key: channel.clone(),
                });
            }
        }
        let mask = self
            .var_names
            .iter()
            .map(|name| channels.contains(name))
            .collect::<Array1<bool>>();
        self.insert_var_column(key, Column::Bool(mask))
    }
}

impl CellRepository for CellData {
    fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    fn n_vars(&self) -> usize {
        self.x.ncols()
    }

    fn matrix(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    fn embedding(&self, key: &str) -> Option<ArrayView2<'_, f64>> {
        self.obsm.get(key).map(|e| e.view())
    }

    fn var_column(&self, key: &str) -> Option<&Column> {
        self.var.get(key)
    }

    fn obs_column(&self, key: &str) -> Option<&Column> {
        self.obs.get(key)
    }

    fn set_obs_column(&mut self, key: &str, column: Column) -> Result<()> {
        if column.len() != self.x.nrows() {
            return Err(ClusterError::Length {
                what: "cell annotation column",
                expected: self.x.nrows(),
                got: column.len(),
            });
        }
        self.obs.insert(key.to_string(), column);
        Ok(())
    }

    fn result(&self, key: &str) -> Option<&ClusterRecord> {
        self.uns.get(key)
    }

    fn set_result(&mut self, key: &str, record: ClusterRecord) {
        self.uns.insert(key.to_string(), record);
    }
}
