//! Backward-facing step driven by a periodic blowing slot
//!
//! cargo run --release --example step_transient
use flowctl::callbacks::{CheckpointCallback, LogCallback};
use flowctl::config::{FlowConfig, FlowKind};
use flowctl::flow::{Observation, Step, Transient};
use flowctl::{integrate, Flow};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    // Parameters
    let re = 150.;
    let dt = 0.02;
    let amplitude = 0.2;
    let frequency = 0.5;

    let mut flow = Step::new(&FlowConfig::new(FlowKind::Step).with_reynolds(re)).unwrap();
    let base = flow.solve_steady().unwrap();
    flow.random_disturbance(1e-3).unwrap();

    let forcing = move |t: f64, _: &Observation| {
        vec![amplitude * (2. * std::f64::consts::PI * frequency * t).sin()]
    };
    let mut solver = Transient::new(flow, dt)
        .unwrap()
        .with_controller(Box::new(forcing));
    solver.add_callback(Box::new(LogCallback::new(25, dt).with_base(base)));
    solver.add_callback(Box::new(CheckpointCallback::new(250, "data/step.json")));
    integrate(&mut solver, 10., None).unwrap();

    let vort = solver.flow().vorticity().unwrap();
    let max = vort.values.iter().fold(0f64, |m, v| m.max(v.abs()));
    println!("max |{}| = {:8.4}", vort.name, max);
}
