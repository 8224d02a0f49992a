//! Expression-tree data model: tagged node kinds, the per-root arena, tree
//! operations, and mutation. See spec §3 for the full invariant list.

mod mutate;
pub mod ops;
mod pool;
mod root;

pub use mutate::mutate;
pub use ops::NodeList;
pub use pool::Pool;
pub use root::Root;

use crate::Scalar;

/// Handle to a slot inside a single `Pool`. Only meaningful relative to the
/// `Root` that owns the pool it was allocated from — there is no
/// cross-root validity check beyond that discipline, the same way the
/// original's raw pointers are only meaningful relative to their owning
/// `RootNode` (see DESIGN.md, "owning root back-reference").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// A leaf's payload: either a rounded constant or a variable index, both
/// encoded in the same scalar field per spec §3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    pub scalar: Scalar,
    pub is_set: bool,
}

impl Value {
    pub fn unset() -> Self {
        Self {
            scalar: 0.0,
            is_set: false,
        }
    }
    pub fn of(scalar: Scalar) -> Self {
        Self {
            scalar,
            is_set: true,
        }
    }
}

/// Round to `decimal_places` digits and saturate/collapse per spec §3
/// invariant 5. Applied to every `CONSTANT` leaf before it is stored.
pub fn normalize_constant(value: Scalar, decimal_places: i32, min_abs: Scalar, max_abs: Scalar) -> Scalar {
    if !value.is_finite() {
        return value;
    }
    if value.abs() < min_abs {
        return 0.0;
    }
    if value.abs() > max_abs {
        return if value.is_sign_negative() {
            Scalar::NEG_INFINITY
        } else {
            Scalar::INFINITY
        };
    }
    let factor = 10f64.powi(decimal_places);
    (value * factor).round() / factor
}

/// Structural validity of a node (spec §7 item 4): mismatched arity, unset
/// leaf value, invalid kind, or broken parent/child linkage. Never fatal —
/// callers log and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    InvalidKind,
    Arity,
    UnsetValue,
    MissingChild(u8),
    ChildLinkBroken(u8),
    ParentLinkBroken,
    Success,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_small_magnitudes() {
        assert_eq!(normalize_constant(1e-9, 4, 1e-6, 1e6), 0.0);
    }

    #[test]
    fn normalize_saturates_large_magnitudes() {
        assert_eq!(normalize_constant(1e9, 4, 1e-6, 1e6), Scalar::INFINITY);
        assert_eq!(normalize_constant(-1e9, 4, 1e-6, 1e6), Scalar::NEG_INFINITY);
    }

    #[test]
    fn normalize_rounds_to_decimal_places() {
        assert_eq!(normalize_constant(3.14159, 2, 1e-6, 1e6), 3.14);
    }
}
