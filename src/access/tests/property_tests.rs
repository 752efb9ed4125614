//! Property tests for role graph expansion

use proptest::prelude::*;
use quill_access::graph::RoleGraphBuilder;
use quill_access::resolver::expand;
use quill_access::seed::RoleGraphSeed;
use quill_access::types::{Role, RoleHierarchy};
use quill_access::{
    ConflictConstraint, DutySeparationValidator, InMemoryRoleStore, PermissionResolver, SeparationPolicy,
};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Roles `0..n`, each granting `P{i}`, with the given (parent, child) edges
fn build(n: usize, edges: &[(usize, usize)]) -> quill_access::RoleGraph {
    let mut builder = RoleGraphBuilder::new();
    for i in 0..n {
        builder
            .add_role(Role::new(i as i64, format!("R{}", i)), vec![format!("P{}", i)])
            .unwrap();
    }
    for (parent, child) in edges {
        builder.add_inheritance(*parent as i64, *child as i64);
    }
    builder.build().unwrap()
}

/// Reference closure by repeated relaxation
fn ancestors(root: usize, edges: &[(usize, usize)]) -> HashSet<usize> {
    let mut reached: HashSet<usize> = [root].into_iter().collect();
    loop {
        let before = reached.len();
        for (parent, child) in edges {
            if reached.contains(child) {
                reached.insert(*parent);
            }
        }
        if reached.len() == before {
            return reached;
        }
    }
}

/// Validator over roles `0..n` with one static pair
fn validator(n: usize, edges: &[(usize, usize)], pair: (usize, usize)) -> DutySeparationValidator {
    let seed = RoleGraphSeed {
        roles: (0..n).map(|i| Role::new(i as i64, format!("R{}", i))).collect(),
        hierarchy: edges
            .iter()
            .map(|(parent, child)| RoleHierarchy {
                parent_role_id: *parent as i64,
                child_role_id: *child as i64,
            })
            .collect(),
        ..Default::default()
    };
    let store = Arc::new(InMemoryRoleStore::from_seed(seed));
    let policy = SeparationPolicy::new(
        vec![ConflictConstraint::new(format!("R{}", pair.0), format!("R{}", pair.1))],
        vec![],
    );
    DutySeparationValidator::new(PermissionResolver::new(store), Arc::new(policy))
}

fn dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let edge = (0..n, 0..n).prop_filter_map("parent must precede child", |(a, b)| {
            if a < b {
                Some((a, b))
            } else {
                None
            }
        });
        (Just(n), prop::collection::vec(edge, 0..24))
    })
}

fn any_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..10).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..30)))
}

proptest! {
    #[test]
    fn prop_acyclic_closure_is_ancestor_union((n, edges) in dag()) {
        let graph = build(n, &edges);
        prop_assert!(graph.find_cycle().is_none());

        for root in 0..n {
            let resolved = expand(&graph, root as i64).unwrap();
            let expected: BTreeSet<String> = ancestors(root, &edges)
                .into_iter()
                .map(|i| format!("P{}", i))
                .collect();

            prop_assert_eq!(&resolved.permissions, &expected);
            prop_assert_eq!(resolved.roles.len(), expected.len());
        }
    }

    #[test]
    fn prop_cyclic_graphs_terminate((n, edges) in any_graph()) {
        let graph = build(n, &edges);

        for root in 0..n {
            let resolved = expand(&graph, root as i64).unwrap();
            prop_assert!(resolved.roles.len() <= n);
            prop_assert_eq!(resolved.roles.len(), ancestors(root, &edges).len());
            let root_name = format!("R{}", root);
            prop_assert!(resolved.roles.contains(&root_name));
        }
    }

    #[test]
    fn prop_closure_contains_parents_closure((n, edges) in dag()) {
        let graph = build(n, &edges);

        for (parent, child) in &edges {
            let child_set = expand(&graph, *child as i64).unwrap();
            let parent_set = expand(&graph, *parent as i64).unwrap();
            prop_assert!(parent_set.permissions.is_subset(&child_set.permissions));
        }
    }

    #[test]
    fn prop_assignment_check_is_symmetric(
        (n, edges) in dag(),
        a in 0usize..12,
        b in 0usize..12,
        x in 0usize..12,
        y in 0usize..12,
    ) {
        let (a, b, x, y) = (a % n, b % n, x % n, y % n);
        prop_assume!(a != b);
        let validator = validator(n, &edges, (a, b));

        tokio_test::block_on(async {
            let forward = validator.validate_transition(x as i64, y as i64).await;
            let backward = validator.validate_transition(y as i64, x as i64).await;
            assert_eq!(forward.is_ok(), backward.is_ok());

            let held: HashSet<usize> = ancestors(x, &edges).union(&ancestors(y, &edges)).copied().collect();
            let conflicting = held.contains(&a) && held.contains(&b);
            assert_eq!(forward.is_err(), conflicting);
        });
    }
}
