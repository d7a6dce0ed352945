pub mod correlation;
pub mod tuple_range;

pub use tuple_range::{
    TupleRange,
    TupleRangeError,
};

/// Absolute tolerance window around a value, `[elem - tol, elem + tol]`.
///
/// Negative tolerances collapse to a zero-width window instead of failing,
/// configuration is not validated by this crate.
pub fn abs_tol_range(elem: f64, tol: f64) -> TupleRange<f64> {
    let utol = tol.max(0.0);
    TupleRange::new_sorted(elem - utol, elem + utol)
}
