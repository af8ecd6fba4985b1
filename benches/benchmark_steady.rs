use criterion::{criterion_group, criterion_main, Criterion};
use flowctl::config::{FlowConfig, FlowKind};
use flowctl::flow::flow_eq::{assemble_steady, velocity_mass};
use flowctl::solver::{Solve, SparseLu};
use flowctl::{Flow, FlowVariant};

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(10);
    let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
    let base = flow.solve_steady().unwrap();
    let space = flow.core().space().clone();
    let q = base.as_array();
    let re = flow.reynolds();

    group.bench_function("assemble", |b| {
        b.iter(|| assemble_steady(&space, q, re, true))
    });

    let (r, jac) = assemble_steady(&space, q, re, true);
    let jac = jac.unwrap();
    group.bench_function("factorize", |b| {
        b.iter(|| SparseLu::from_matrix(&jac).unwrap())
    });

    let lu = SparseLu::from_matrix(&jac).unwrap();
    group.bench_function("solve", |b| b.iter(|| lu.solve_vec(&r)));

    let mass = velocity_mass(&space);
    group.bench_function("transient_matrix", |b| {
        b.iter(|| mass.add_scaled(10., &jac, 1.))
    });

    group.bench_function("newton_from_rest", |b| {
        b.iter(|| {
            let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
            flow.solve_steady().unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
