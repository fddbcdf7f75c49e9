//! Benchmarks for mesh-roof construction.
//!
//! Run with: cargo bench -p mesh-roof
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-roof -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-roof -- --baseline main

#![allow(
    missing_docs,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_roof::{Point3, RoofParams, build_roof};

// =============================================================================
// Test Polygon Generation
// =============================================================================

/// Regular polygon with `n` vertices on a circle.
fn create_regular(n: usize, radius: f64) -> Vec<Point3<f64>> {
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            Point3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        })
        .collect()
}

/// Axis-aligned rectangle centered at the origin.
fn create_rectangle(width: f64, depth: f64) -> Vec<Point3<f64>> {
    let (hw, hd) = (width / 2.0, depth / 2.0);
    vec![
        Point3::new(-hw, -hd, 0.0),
        Point3::new(hw, -hd, 0.0),
        Point3::new(hw, hd, 0.0),
        Point3::new(-hw, hd, 0.0),
    ]
}

/// Comb with `teeth` notches cut into its top side.
///
/// Every notch contributes two reflex vertices.
fn create_comb(teeth: usize) -> Vec<Point3<f64>> {
    let width = 3.0 * teeth as f64;
    let mut polygon = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(width, 0.0, 0.0)];
    for i in (0..teeth).rev() {
        let x = 3.0 * i as f64;
        polygon.push(Point3::new(x + 2.0, 4.0, 0.0));
        polygon.push(Point3::new(x + 2.0, 2.0, 0.0));
        polygon.push(Point3::new(x + 1.0, 2.0, 0.0));
        polygon.push(Point3::new(x + 1.0, 4.0, 0.0));
    }
    polygon.push(Point3::new(0.0, 4.0, 0.0));
    polygon
}

// =============================================================================
// Roof Construction Benchmarks
// =============================================================================

fn bench_convex(c: &mut Criterion) {
    let params = RoofParams::default();
    let mut group = c.benchmark_group("Roof_Convex");

    let rect = create_rectangle(8.0, 3.0);
    group.bench_function("rectangle", |b| {
        b.iter(|| build_roof(black_box(&rect), black_box(&params)));
    });

    for n in [5, 7, 11] {
        let polygon = create_regular(n, 5.0);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("regular_{n}"), |b| {
            b.iter(|| build_roof(black_box(&polygon), black_box(&params)));
        });
    }

    group.finish();
}

fn bench_concave(c: &mut Criterion) {
    let params = RoofParams::default();
    let mut group = c.benchmark_group("Roof_Concave");
    group.sample_size(20);

    for teeth in [2, 4, 8] {
        let polygon = create_comb(teeth);
        group.throughput(Throughput::Elements(polygon.len() as u64));
        group.bench_function(format!("comb_{teeth}"), |b| {
            b.iter(|| {
                let _ = build_roof(black_box(&polygon), black_box(&params));
            });
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_convex, bench_concave);
criterion_main!(benches);
