//! Access guard benchmarks
//!
//! Expansion cost over deep inheritance chains, and end-to-end decisions with
//! and without the resolution cache.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quill_access::graph::RoleGraphBuilder;
use quill_access::resolver::expand;
use quill_access::seed::{self, RoleGraphSeed};
use quill_access::types::{Permission, Role, RoleHierarchy, RolePermission};
use quill_access::{
    AccessConfig, AccessEngine, Identity, InMemoryRoleStore, Requirement, ResolverConfig,
    SeparationPolicy,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Roles `0..depth`, each inheriting from the previous and granting one permission
fn chain_seed(depth: usize) -> RoleGraphSeed {
    let mut seed = RoleGraphSeed::default();
    for i in 0..depth as i64 {
        seed.roles.push(Role::new(i, format!("ROLE_{}", i)));
        seed.permissions.push(Permission::new(i, format!("PERM_{}", i)));
        seed.role_permissions.push(RolePermission {
            role_id: i,
            permission_id: i,
        });
        if i > 0 {
            seed.hierarchy.push(RoleHierarchy {
                parent_role_id: i - 1,
                child_role_id: i,
            });
        }
    }
    seed
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_chain");

    for depth in [5usize, 50, 500] {
        let mut builder = RoleGraphBuilder::new();
        for i in 0..depth as i64 {
            builder
                .add_role(Role::new(i, format!("ROLE_{}", i)), vec![format!("PERM_{}", i)])
                .unwrap();
            if i > 0 {
                builder.add_inheritance(i - 1, i);
            }
        }
        let graph = builder.build().unwrap();
        let leaf = depth as i64 - 1;

        group.bench_with_input(BenchmarkId::new("depth", depth), &leaf, |b, &leaf| {
            b.iter(|| black_box(expand(&graph, black_box(leaf)).unwrap()));
        });
    }

    group.finish();
}

fn bench_authorize(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("authorize");

    for (label, resolver) in [("uncached", ResolverConfig::uncached()), ("cached", ResolverConfig::default())] {
        for depth in [5usize, 50] {
            let leaf = depth as i64 - 1;
            let store = Arc::new(InMemoryRoleStore::from_seed(chain_seed(depth).with_user("bench", leaf)));
            let config = AccessConfig {
                separation: SeparationPolicy::empty(),
                resolver: resolver.clone(),
                enable_metrics: false,
            };
            let engine = AccessEngine::new(store, config).unwrap();
            let identity = Identity::new("bench");
            let requirement = Requirement::all(["PERM_0"]);

            group.bench_with_input(BenchmarkId::new(label, depth), &depth, |b, _| {
                b.to_async(&rt).iter(|| async {
                    black_box(engine.authorize(Some(&identity), &requirement).await);
                });
            });
        }
    }

    group.finish();
}

fn bench_platform_seed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(InMemoryRoleStore::from_seed(seed::platform().with_user("writer", 1)));
    let engine = AccessEngine::new(store, AccessConfig::default()).unwrap();
    let identity = Identity::new("writer");
    let requirement = Requirement::all(["COMMENT", "CREATE_ARTICLE"]);

    c.bench_function("authorize_platform_writer", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(engine.authorize(Some(&identity), &requirement).await);
        });
    });
}

criterion_group!(benches, bench_expand, bench_authorize, bench_platform_seed);
criterion_main!(benches);
