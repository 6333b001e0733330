//! Route matching benchmarks.
//!
//! Run with: `cargo bench -p keystone-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use keystone_core::Params;
use keystone_router::{Route, RouteMatcher, RouteTable, UriGenerator};
use std::sync::Arc;

fn build_table(num_routes: usize) -> Arc<RouteTable> {
    let mut table = RouteTable::new();

    for i in 0..num_routes / 3 {
        table
            .add_get(format!("/api/v1/resource{i}"), format!("Resource{i}:index"))
            .unwrap();
    }

    for i in 0..num_routes / 3 {
        table
            .add_route(
                Route::builder(format!("/api/v1/resource{i}/{{id}}"), format!("Resource{i}:show"))
                    .name(format!("resource{i}_show"))
                    .method("GET")
                    .constraint("id", r"\d+"),
            )
            .unwrap();
    }

    for i in 0..num_routes / 3 {
        table
            .add_get(
                format!("/api/v1/org/{{org}}/resource{i}/{{id}}"),
                format!("OrgResource{i}:show"),
            )
            .unwrap();
    }

    Arc::new(table)
}

fn bench_static_match(c: &mut Criterion) {
    let matcher = RouteMatcher::new(build_table(100));

    c.bench_function("static_match", |b| {
        b.iter(|| black_box(matcher.match_route("/api/v1/resource20", &Method::GET)));
    });
}

fn bench_constrained_match(c: &mut Criterion) {
    let matcher = RouteMatcher::new(build_table(100));

    c.bench_function("constrained_match", |b| {
        b.iter(|| black_box(matcher.match_route("/api/v1/resource25/12345", &Method::GET)));
    });
}

fn bench_miss(c: &mut Criterion) {
    let matcher = RouteMatcher::new(build_table(100));

    c.bench_function("miss", |b| {
        b.iter(|| black_box(matcher.match_route("/api/v1/nonexistent/path", &Method::GET)));
    });
}

fn bench_generate(c: &mut Criterion) {
    let generator = UriGenerator::new(build_table(100));
    let params = Params::new().with("id", 12345);

    c.bench_function("generate", |b| {
        b.iter(|| black_box(generator.generate("resource25_show", &params)));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for num_routes in [10, 50, 100, 500] {
        let matcher = RouteMatcher::new(build_table(num_routes));

        group.bench_with_input(
            BenchmarkId::new("last_static_route", num_routes),
            &num_routes,
            |b, &n| {
                let path = format!("/api/v1/resource{}", n / 3 - 1);
                b.iter(|| black_box(matcher.match_route(&path, &Method::GET)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_static_match,
    bench_constrained_match,
    bench_miss,
    bench_generate,
    bench_scaling
);
criterion_main!(benches);
