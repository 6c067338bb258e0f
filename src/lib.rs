//! Clustering of flow cytometry cell-by-channel matrices.
//!
//! The centerpiece is a hand-rolled gaussian mixture fitted by hard
//! assignment ([`clustering::GaussianMixture`]), alongside k-means and
//! agglomerative clustering behind swappable backends. The functions in
//! [`tools`] run any of them against a [`container::CellRepository`],
//! storing labels and metadata back into it.

pub mod clustering;
pub mod container;
pub mod error;
pub mod features;
pub mod io;
pub mod tools;

pub use error::{ClusterError, Result};
