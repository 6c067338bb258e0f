//! Error types shared by the resolver, the estimators and the I/O helpers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Mutually exclusive or unrecognized options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A column had the wrong element type.
    #[error("column '{column}' must be boolean, found {found}")]
    ColumnType { column: String, found: &'static str },

    #[error("{what} has shape {got:?}, expected {expected:?}")]
    Shape {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("{what} has length {got}, expected {expected}")]
    Length {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("no {kind} named '{key}'")]
    MissingKey { kind: &'static str, key: String },

    #[error("feature matrix is empty ({rows} x {cols})")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error(transparent)]
    KMeans(#[from] linfa_clustering::KMeansError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("line {line}, column '{column}': cannot parse '{value}' as a number")]
    Parse {
        line: usize,
        column: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ClusterError::Shape {
            what: "initial centers",
            expected: (3, 2),
            got: (2, 2),
        };
        assert_eq!(
            err.to_string(),
            "initial centers has shape (2, 2), expected (3, 2)"
        );

        let err = ClusterError::ColumnType {
            column: "gated".to_string(),
            found: "float",
        };
        assert_eq!(err.to_string(), "column 'gated' must be boolean, found float");

        let err = ClusterError::MissingKey {
            kind: "embedding",
            key: "X_umap".to_string(),
        };
        assert_eq!(err.to_string(), "no embedding named 'X_umap'");
    }
}
