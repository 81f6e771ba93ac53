//! Dimension vectors and the pure arithmetic over them: element counts,
//! broadcasting, element-stride derivation, and the squeeze/unsqueeze/
//! reshape validation rules.

use crate::error::{GPError, GPResult};

/// An ordered sequence of dimensions. Dimensions are non-negative; the
/// only rank-0 shape is the empty vector, whose element count is 1 (a
/// scalar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape(Vec<i64>);

impl Shape {
    /// Construct a `Shape` from dimensions. Negative dimensions are
    /// rejected; a rank-0 (empty) shape is valid and denotes a scalar.
    pub fn new(dims: impl Into<Vec<i64>>) -> GPResult<Self> {
        let dims = dims.into();
        if let Some(&d) = dims.iter().find(|&&d| d < 0) {
            return Err(GPError::invalid_argument(format!(
                "Shape dimensions must be non-negative, found {d}"
            )));
        }
        Ok(Shape(dims))
    }

    /// Like [`Shape::new`] but panics on invalid input; intended for
    /// literal shapes in tests and call sites that already know the
    /// dimensions are valid.
    pub fn from_dims(dims: impl Into<Vec<i64>>) -> Self {
        Shape::new(dims).expect("Shape::from_dims given negative dimension")
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[i64] {
        &self.0
    }

    pub fn dim(&self, i: usize) -> GPResult<i64> {
        self.0.get(i).copied().ok_or_else(|| {
            GPError::invalid_argument(format!("axis {i} out of range for rank {}", self.rank()))
        })
    }

    /// Product of all dimensions; 1 for rank 0 (a scalar).
    pub fn num_elements(&self) -> i64 {
        self.0.iter().product()
    }

    /// Element-count strides (not bytes), derived right-to-left for a
    /// row-major layout.
    pub fn strides(&self) -> Vec<i64> {
        let mut strides = vec![1i64; self.0.len()];
        let mut acc = 1i64;
        for i in (0..self.0.len()).rev() {
            strides[i] = acc;
            acc *= self.0[i];
        }
        strides
    }

    /// Resolve a possibly-negative axis against this shape's rank, using
    /// `extra` extra valid positions past the end (used by `unsqueeze`,
    /// whose valid range is `rank + 1` wide).
    fn resolve_axis(&self, axis: i64, extra: usize) -> GPResult<usize> {
        let rank = self.rank() as i64;
        let upper = rank + extra as i64;
        let resolved = if axis < 0 { axis + upper } else { axis };
        if resolved < 0 || resolved >= upper {
            return Err(GPError::invalid_argument(format!(
                "axis {axis} out of range for rank {rank}"
            )));
        }
        Ok(resolved as usize)
    }

    /// `axis == -1` drops every axis of size 1. Otherwise resolves the
    /// (possibly negative) axis and requires the selected dimension to be
    /// exactly 1.
    pub fn squeeze(&self, axis: i64) -> GPResult<Shape> {
        if axis == -1 {
            let dims: Vec<i64> = self.0.iter().copied().filter(|&d| d != 1).collect();
            return Ok(Shape(dims));
        }
        let idx = self.resolve_axis(axis, 0)?;
        if self.0[idx] != 1 {
            return Err(GPError::invalid_argument(format!(
                "cannot squeeze axis {idx} with size {} (expected 1)",
                self.0[idx]
            )));
        }
        let mut dims = self.0.clone();
        dims.remove(idx);
        Ok(Shape(dims))
    }

    /// Drop every axis of size 1. Shorthand for `squeeze(-1)`.
    pub fn squeeze_all(&self) -> Shape {
        self.squeeze(-1).expect("squeeze(-1) never fails")
    }

    /// Insert a dimension of size 1 at `axis`. Valid range is
    /// `[-(rank+1), rank]`.
    pub fn unsqueeze(&self, axis: i64) -> GPResult<Shape> {
        let idx = self.resolve_axis(axis, 1)?;
        let mut dims = self.0.clone();
        dims.insert(idx, 1);
        Ok(Shape(dims))
    }

    /// Whether `a` can be reshaped to `b`: equal element counts.
    pub fn can_reshape(a: &Shape, b: &Shape) -> bool {
        a.num_elements() == b.num_elements()
    }

    /// Right-aligned broadcast: each axis pair must be equal, or one of
    /// them must be 1. The result takes the max of each pair.
    pub fn broadcast(a: &Shape, b: &Shape) -> GPResult<Shape> {
        let rank = a.rank().max(b.rank());
        let mut out = vec![0i64; rank];
        for offset in 0..rank {
            // `offset` counts from the right: 0 is the last axis.
            let a_dim = dim_from_right(a, offset);
            let b_dim = dim_from_right(b, offset);
            if a_dim != b_dim && a_dim != 1 && b_dim != 1 {
                return Err(GPError::invalid_argument(format!(
                    "cannot broadcast shapes {:?} and {:?} at aligned axis {offset} from the right",
                    a.dims(),
                    b.dims()
                )));
            }
            out[rank - 1 - offset] = a_dim.max(b_dim);
        }
        Ok(Shape(out))
    }

    /// Collapse to a single dimension. Element count is preserved.
    pub fn flatten(&self) -> Shape {
        Shape(vec![self.num_elements()])
    }

    /// Collapse to `[batch, num_elements / batch]`. Fails if the element
    /// count is not evenly divisible by `batch`.
    pub fn flatten_2d(&self, batch: i64) -> GPResult<Shape> {
        if batch <= 0 {
            return Err(GPError::invalid_argument(format!(
                "flatten_2d: batch must be positive, got {batch}"
            )));
        }
        let total = self.num_elements();
        if total % batch != 0 {
            return Err(GPError::invalid_argument(format!(
                "flatten_2d: num_elements {total} is not divisible by batch {batch}"
            )));
        }
        Ok(Shape(vec![batch, total / batch]))
    }
}

/// The dimension `offset` axes in from the right, or 1 if `offset` runs
/// past this shape's rank (the implicit broadcast dimension).
fn dim_from_right(s: &Shape, offset: usize) -> i64 {
    if offset < s.rank() {
        s.dims()[s.rank() - 1 - offset]
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_and_num_elements_scenario_a() {
        let s = Shape::from_dims([2, 3, 4]);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.num_elements(), 24);
        assert_eq!(s.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn rank_zero_num_elements_is_one() {
        let s = Shape::from_dims([]);
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
    }

    #[test]
    fn squeeze_all_scenario_a() {
        let s = Shape::from_dims([1, 3, 1]);
        assert_eq!(s.squeeze_all().dims(), &[3]);
    }

    #[test]
    fn squeeze_specific_axis() {
        let s = Shape::from_dims([1, 3, 1]);
        assert_eq!(s.squeeze(0).unwrap().dims(), &[3, 1]);
        assert_eq!(s.squeeze(-1).unwrap().dims(), &[3]);
        assert!(s.squeeze(1).is_err());
    }

    #[test]
    fn unsqueeze_inserts_one() {
        let s = Shape::from_dims([3, 4]);
        assert_eq!(s.unsqueeze(0).unwrap().dims(), &[1, 3, 4]);
        assert_eq!(s.unsqueeze(2).unwrap().dims(), &[3, 4, 1]);
        assert_eq!(s.unsqueeze(-1).unwrap().dims(), &[3, 4, 1]);
        assert!(s.unsqueeze(3).is_err());
        assert!(s.unsqueeze(-4).is_err());
    }

    #[test]
    fn broadcast_scenario_a() {
        let a = Shape::from_dims([2, 1, 3]);
        let b = Shape::from_dims([1, 4, 3]);
        assert_eq!(Shape::broadcast(&a, &b).unwrap().dims(), &[2, 4, 3]);
    }

    #[test]
    fn broadcast_is_commutative_when_defined() {
        let a = Shape::from_dims([2, 1, 3]);
        let b = Shape::from_dims([1, 4, 3]);
        assert_eq!(Shape::broadcast(&a, &b), Shape::broadcast(&b, &a));
    }

    #[test]
    fn broadcast_self_is_identity() {
        for dims in [vec![2, 3, 4], vec![1], vec![], vec![5, 1, 7]] {
            let s = Shape::from_dims(dims);
            assert_eq!(Shape::broadcast(&s, &s).unwrap(), s);
        }
    }

    #[test]
    fn broadcast_rejects_incompatible() {
        let a = Shape::from_dims([2, 3]);
        let b = Shape::from_dims([2, 4]);
        assert!(Shape::broadcast(&a, &b).is_err());
    }

    #[test]
    fn can_reshape_checks_element_count() {
        let a = Shape::from_dims([2, 3]);
        let b = Shape::from_dims([3, 2]);
        let c = Shape::from_dims([2, 4]);
        assert!(Shape::can_reshape(&a, &b));
        assert!(!Shape::can_reshape(&a, &c));
    }

    #[test]
    fn flatten_preserves_element_count() {
        let s = Shape::from_dims([2, 3, 4]);
        assert_eq!(s.flatten().dims(), &[24]);
    }

    #[test]
    fn flatten_2d_divides_evenly() {
        let s = Shape::from_dims([2, 3, 4]);
        assert_eq!(s.flatten_2d(2).unwrap().dims(), &[2, 12]);
        assert!(s.flatten_2d(5).is_err());
        assert!(s.flatten_2d(0).is_err());
    }

    #[test]
    fn negative_dims_rejected() {
        assert!(Shape::new([2, -1, 3]).is_err());
    }
}
