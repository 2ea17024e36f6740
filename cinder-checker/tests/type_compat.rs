//! Property-based tests for the type compatibility relation and the
//! nil-resolution helper.
//!
//! These use proptest to generate arbitrary types and check the invariants
//! the rest of the checker leans on: compatibility is reflexive and
//! symmetric, nil bridges exactly the pointer and array constructors, and
//! `pick_non_nil` resolves a compatible pair to a type compatible with both
//! sides.

use proptest::prelude::*;

use cinder_checker::{compatible, pick_non_nil, Type};

/// Strategy for leaf types, including struct names.
fn leaf_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Int),
        Just(Type::Nil),
        "[a-z]{1,8}".prop_map(Type::Struct),
    ]
}

/// Strategy for arbitrary types with bounded nesting.
fn arb_type() -> impl Strategy<Value = Type> {
    leaf_type().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| Type::Ptr(Box::new(t))),
            inner.clone().prop_map(|t| Type::Array(Box::new(t))),
            (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| Type::Fn(params, Box::new(ret))),
        ]
    })
}

/// Strategy for types that nil is *not* compatible with.
fn non_bridgeable_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Int),
        "[a-z]{1,8}".prop_map(Type::Struct),
        (prop::collection::vec(leaf_type(), 0..3), leaf_type())
            .prop_map(|(params, ret)| Type::Fn(params, Box::new(ret))),
    ]
}

/// Strategy for pairs that are compatible by construction: identical types,
/// or nil against a pointer or array.
fn compatible_pair() -> impl Strategy<Value = (Type, Type)> {
    prop_oneof![
        arb_type().prop_map(|t| (t.clone(), t)),
        arb_type().prop_map(|t| (Type::Ptr(Box::new(t)), Type::Nil)),
        arb_type().prop_map(|t| (Type::Nil, Type::Ptr(Box::new(t)))),
        arb_type().prop_map(|t| (Type::Array(Box::new(t)), Type::Nil)),
        arb_type().prop_map(|t| (Type::Nil, Type::Array(Box::new(t)))),
        Just((Type::Nil, Type::Nil)),
    ]
}

proptest! {
    #[test]
    fn compatibility_is_reflexive(ty in arb_type()) {
        prop_assert!(
            compatible(&ty, &ty),
            "{} should be compatible with itself",
            ty.describe()
        );
    }

    #[test]
    fn compatibility_is_symmetric(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(
            compatible(&a, &b),
            compatible(&b, &a),
            "compatibility of {} and {} should not depend on argument order",
            a.describe(),
            b.describe()
        );
    }

    #[test]
    fn nil_bridges_every_pointer_and_array(inner in arb_type()) {
        let ptr = Type::Ptr(Box::new(inner.clone()));
        let array = Type::Array(Box::new(inner));
        prop_assert!(compatible(&Type::Nil, &ptr));
        prop_assert!(compatible(&ptr, &Type::Nil));
        prop_assert!(compatible(&Type::Nil, &array));
        prop_assert!(compatible(&array, &Type::Nil));
    }

    #[test]
    fn nil_rejects_other_constructors(ty in non_bridgeable_type()) {
        prop_assert!(!compatible(&ty, &Type::Nil));
        prop_assert!(!compatible(&Type::Nil, &ty));
    }

    /// For any compatible pair, the resolved type is compatible with both
    /// sides, and it is only nil when both sides were nil.
    #[test]
    fn pick_non_nil_resolves_compatible_pairs((a, b) in compatible_pair()) {
        prop_assert!(compatible(&a, &b));
        let resolved = pick_non_nil(&a, &b);
        prop_assert!(compatible(resolved, &a));
        prop_assert!(compatible(resolved, &b));
        if a != Type::Nil || b != Type::Nil {
            prop_assert_ne!(resolved, &Type::Nil);
        }
    }

    /// Distinct pointer and array types stay incompatible even though both
    /// are compatible with nil: the bridge does not make them transitive.
    #[test]
    fn nil_bridge_is_not_transitive(inner in arb_type()) {
        let ptr = Type::Ptr(Box::new(inner.clone()));
        let array = Type::Array(Box::new(inner));
        prop_assert!(compatible(&ptr, &Type::Nil));
        prop_assert!(compatible(&Type::Nil, &array));
        prop_assert!(!compatible(&ptr, &array));
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn transitivity_counterexample() {
        let ptr_int = Type::Ptr(Box::new(Type::Int));
        let array_int = Type::Array(Box::new(Type::Int));
        assert!(compatible(&ptr_int, &Type::Nil));
        assert!(compatible(&Type::Nil, &array_int));
        assert!(!compatible(&ptr_int, &array_int));
    }

    #[test]
    fn pointer_element_types_compare_structurally() {
        let a = Type::Ptr(Box::new(Type::Int));
        let b = Type::Ptr(Box::new(Type::Array(Box::new(Type::Int))));
        assert!(!compatible(&a, &b));
        assert!(compatible(&a, &a));
    }

    #[test]
    fn pick_prefers_first_non_nil() {
        let ptr = Type::Ptr(Box::new(Type::Int));
        let array = Type::Array(Box::new(Type::Int));
        assert_eq!(pick_non_nil(&ptr, &Type::Nil), &ptr);
        assert_eq!(pick_non_nil(&Type::Nil, &array), &array);
        assert_eq!(pick_non_nil(&ptr, &array), &ptr);
        assert_eq!(pick_non_nil(&Type::Nil, &Type::Nil), &Type::Nil);
    }

    #[test]
    fn describe_spells_types_in_source_notation() {
        assert_eq!(Type::Int.describe(), "int");
        assert_eq!(Type::Nil.describe(), "nil");
        assert_eq!(Type::Struct("node".to_string()).describe(), "struct(node)");
        assert_eq!(
            Type::Ptr(Box::new(Type::Array(Box::new(Type::Int)))).describe(),
            "ptr(array(int))"
        );
        assert_eq!(
            Type::Fn(vec![Type::Int, Type::Nil], Box::new(Type::Int)).describe(),
            "(int, nil) -> int"
        );
        assert_eq!(
            Type::Fn(Vec::new(), Box::new(Type::Int)).describe(),
            "() -> int"
        );
    }

    #[test]
    fn storability_excludes_nil_struct_and_fn() {
        assert!(Type::Int.is_storable());
        assert!(Type::Ptr(Box::new(Type::Struct("s".to_string()))).is_storable());
        assert!(Type::Array(Box::new(Type::Int)).is_storable());
        assert!(!Type::Nil.is_storable());
        assert!(!Type::Struct("s".to_string()).is_storable());
        assert!(!Type::Fn(Vec::new(), Box::new(Type::Int)).is_storable());
    }
}
