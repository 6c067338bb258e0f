use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

pub fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    Zip::from(&a)
        .and(&b)
        .fold(0.0, |acc, &u, &v| acc + (u - v) * (u - v))
}

// Label each row of `x` with the index of the closest row of `centers`
// (squared Euclidean distance). Ties go to the lowest index and a NaN
// distance never wins.
pub fn nearest_center(x: ArrayView2<f64>, centers: ArrayView2<f64>) -> Array1<usize> {
    let mut labels = Array1::<usize>::zeros(x.nrows());
    Zip::from(&mut labels)
        .and(x.rows())
        .par_for_each(|label, row| {
            *label = argmin_distance(row, centers).0;
        });
    labels
}

// Index of and squared distance to the closest center.
pub fn argmin_distance(row: ArrayView1<f64>, centers: ArrayView2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, center) in centers.rows().into_iter().enumerate() {
        let d = squared_distance(row, center);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

// Label each row of `scores` with its highest-scoring column. Ties go to the
// lowest index, NaN never wins, and a row with nothing above -inf gets 0.
pub fn argmax_rows(scores: ArrayView2<f64>) -> Array1<usize> {
    let mut labels = Array1::<usize>::zeros(scores.nrows());
    Zip::from(&mut labels)
        .and(scores.rows())
        .par_for_each(|label, row| {
            let mut best = f64::NEG_INFINITY;
            for (j, &s) in row.iter().enumerate() {
                if s > best {
                    best = s;
                    *label = j;
                }
            }
        });
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nearest_center() {
        let x = array![[0.0, 0.0], [9.0, 9.0], [4.0, 5.0], [1.0, -1.0]];
        let centers = array![[0.0, 0.0], [10.0, 10.0], [4.0, 4.0]];
        let labels = nearest_center(x.view(), centers.view());
        assert_eq!(labels, array![0, 1, 2, 0]);
    }

    #[test]
    fn test_nearest_center_ties_go_low() {
        let x = array![[5.0, 0.0]];
        let centers = array![[10.0, 0.0], [0.0, 0.0], [10.0, 0.0]];
        assert_eq!(nearest_center(x.view(), centers.view()), array![0]);

        let centers = array![[f64::NAN, 0.0], [0.0, 0.0], [10.0, 0.0]];
        assert_eq!(nearest_center(x.view(), centers.view()), array![1]);
    }

    #[test]
    fn test_argmax_rows() {
        let scores = array![
            [-1.0, -2.0, -3.0],
            [-3.0, -1.0, -1.0],
            [f64::NAN, -5.0, f64::NEG_INFINITY],
            [f64::NAN, f64::NAN, f64::NAN],
        ];
        assert_eq!(argmax_rows(scores.view()), array![0, 1, 1, 0]);
    }
}
