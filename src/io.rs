// Reading cell-by-channel matrices from CSV (optionally gzipped) and writing
// labels and clustering metadata back out.

use flate2::read::GzDecoder;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufWriter, Read, Write};

use crate::clustering::ClusterRecord;
use crate::container::CellData;
use crate::error::{ClusterError, Result};

/// Read a matrix with one header row of channel names and one row per cell.
pub fn read_matrix_csv(path: &str) -> Result<CellData> {
    let file = File::open(path)?;
    if path.ends_with(".gz") {
        read_matrix(GzDecoder::new(file))
    } else {
        read_matrix(file)
    }
}

pub fn read_matrix<R: Read>(input: R) -> Result<CellData> {
    let mut rdr = csv::Reader::from_reader(input);
    let channels = rdr
        .headers()?
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    let mut values = Vec::new();
    let mut nrows = 0;
    for result in rdr.records() {
        let row = result?;
        for (value, channel) in row.iter().zip(&channels) {
            let v = value.trim().parse::<f64>().map_err(|_| ClusterError::Parse {
                line: row.position().map_or(0, |p| p.line() as usize),
                column: channel.clone(),
                value: value.to_string(),
            })?;
            values.push(v);
        }
        nrows += 1;
    }

    let x = Array2::from_shape_vec((nrows, channels.len()), values).map_err(|_| {
        ClusterError::Configuration("matrix rows have differing lengths".to_string())
    })?;
    CellData::with_var_names(x, channels)
}

/// Read a `k × d` center matrix, one center per row. A leading row that
/// doesn't parse as numbers is taken to be a header and skipped.
pub fn read_centers_csv(path: &str) -> Result<Array2<f64>> {
    read_centers(File::open(path)?)
}

pub fn read_centers<R: Read>(input: R) -> Result<Array2<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input);

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = result?;
        let parsed = row
            .iter()
            .map(|value| value.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>();
        match parsed {
            Ok(values) => rows.push(values),
            Err(_) if i == 0 => continue,
            Err(_) => {
                let (column, value) = row
                    .iter()
                    .enumerate()
                    .find(|(_, value)| value.trim().parse::<f64>().is_err())
                    .unwrap_or((0, ""));
                return Err(ClusterError::Parse {
                    line: row.position().map_or(0, |p| p.line() as usize),
                    column: column.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    let ncols = rows.first().map_or(0, |row| row.len());
    let nrows = rows.len();
    let values = rows.into_iter().flatten().collect::<Vec<_>>();
    Array2::from_shape_vec((nrows, ncols), values).map_err(|_| {
        ClusterError::Configuration("center rows have differing lengths".to_string())
    })
}

pub fn write_labels_csv(path: &str, key: &str, labels: &Array1<i64>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["cell", key])?;
    for (i, label) in labels.iter().enumerate() {
        wtr.write_record([i.to_string(), label.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_record_json(path: &str, record: &ClusterRecord) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, record)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::CellRepository;
    use ndarray::array;

    #[test]
    fn test_read_matrix() {
        let input = "FSC-A,CD3,CD19\n1.0,2.5,-3\n4,5,6e2\n";
        let data = read_matrix(input.as_bytes()).unwrap();
        assert_eq!(data.var_names(), &["FSC-A", "CD3", "CD19"]);
        assert_eq!(data.matrix(), array![[1.0, 2.5, -3.0], [4.0, 5.0, 600.0]]);
    }

    #[test]
    fn test_read_matrix_bad_value() {
        let input = "CD3,CD19\n1.0,2.0\n3.0,high\n";
        match read_matrix(input.as_bytes()) {
            Err(ClusterError::Parse { column, value, .. }) => {
                assert_eq!(column, "CD19");
                assert_eq!(value, "high");
            }
            _ => panic!("expected a parse error"),
        }
    }

    #[test]
    fn test_read_centers_with_and_without_header() {
        let expected = array![[1.0, 2.0], [3.0, 4.5]];
        assert_eq!(read_centers("1,2\n3,4.5\n".as_bytes()).unwrap(), expected);
        assert_eq!(
            read_centers("CD3,CD19\n1,2\n3,4.5\n".as_bytes()).unwrap(),
            expected
        );
        assert!(matches!(
            read_centers("1,2\n3,oops\n".as_bytes()),
            Err(ClusterError::Parse { .. })
        ));
    }

    #[test]
    fn test_read_matrix_ragged() {
        let input = "CD3,CD19\n1.0,2.0\n3.0\n";
        assert!(read_matrix(input.as_bytes()).is_err());
    }
}
