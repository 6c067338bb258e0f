use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

// Column means of `x`. An empty matrix gives NaN means.
pub fn column_means(x: ArrayView2<f64>) -> Array1<f64> {
    x.sum_axis(Axis(0)) / x.nrows() as f64
}

// Sample covariance of the rows of `x` around `mean`, with an n - 1
// denominator. Fewer than two rows gives non-finite entries, which is
// passed through to the caller untouched.
pub fn sample_covariance(x: ArrayView2<f64>, mean: ArrayView1<f64>) -> Array2<f64> {
    let centered = &x - &mean;
    centered.t().dot(&centered) / (x.nrows() as f64 - 1.0)
}

// Invert a square matrix by Gauss-Jordan elimination with partial pivoting,
// returning the inverse along with the determinant.
//
// A zero (or non-finite) pivot means the matrix is singular: the inverse
// comes back filled with NaN and the determinant is zero.
pub fn invert(a: ArrayView2<f64>) -> (Array2<f64>, f64) {
    let d = a.nrows();
    debug_assert_eq!(d, a.ncols());

    let mut m = a.to_owned();
    let mut inv = Array2::<f64>::eye(d);
    let mut det = 1.0;

    for col in 0..d {
        let mut pivot_row = col;
        let mut pivot_abs = m[[col, col]].abs();
        for row in (col + 1)..d {
            let v = m[[row, col]].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }

        let pivot = m[[pivot_row, col]];
        if pivot == 0.0 || !pivot.is_finite() {
            return (Array2::from_elem((d, d), f64::NAN), 0.0);
        }

        if pivot_row != col {
            swap_rows(&mut m, pivot_row, col);
            swap_rows(&mut inv, pivot_row, col);
            det = -det;
        }
        det *= pivot;

        m.row_mut(col).mapv_inplace(|v| v / pivot);
        inv.row_mut(col).mapv_inplace(|v| v / pivot);

        let m_pivot = m.row(col).to_owned();
        let inv_pivot = inv.row(col).to_owned();
        for row in 0..d {
            if row == col {
                continue;
            }
            let factor = m[[row, col]];
            if factor != 0.0 {
                m.row_mut(row).scaled_add(-factor, &m_pivot);
                inv.row_mut(row).scaled_add(-factor, &inv_pivot);
            }
        }
    }

    (inv, det)
}

fn swap_rows(m: &mut Array2<f64>, i: usize, j: usize) {
    for k in 0..m.ncols() {
        m.swap([i, k], [j, k]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, eps: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < eps, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_invert_2x2() {
        let a = array![[4.0, 7.0], [2.0, 6.0]];
        let (inv, det) = invert(a.view());
        assert!((det - 10.0).abs() < 1e-12);
        assert_close(&inv, &array![[0.6, -0.7], [-0.2, 0.4]], 1e-12);
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let a = array![[0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 3.0]];
        let (inv, det) = invert(a.view());
        assert!((det + 6.0).abs() < 1e-12);
        assert_close(&a.dot(&inv), &Array2::eye(3), 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let (inv, det) = invert(a.view());
        assert_eq!(det, 0.0);
        assert!(inv.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_covariance() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
        let mean = column_means(x.view());
        assert_eq!(mean, array![3.0, 6.0]);

        let cov = sample_covariance(x.view(), mean.view());
        assert_close(&cov, &array![[4.0, 8.0], [8.0, 16.0]], 1e-12);
    }

    #[test]
    fn test_covariance_single_row() {
        let x = array![[1.0, 2.0]];
        let mean = column_means(x.view());
        let cov = sample_covariance(x.view(), mean.view());
        assert!(cov.iter().all(|v| !v.is_finite()));
    }
}
