//! Steady cylinder wake through continuation in the Reynolds number
//!
//! cargo run --release --example cylinder_continuation
use flowctl::config::{FlowConfig, FlowKind};
use flowctl::flow::continuation::reynolds_levels;
use flowctl::{Flow, FlowVariant};
use std::path::Path;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config = FlowConfig::new(FlowKind::Cylinder).with_reynolds(20.);
    let mut flow = FlowVariant::new(&config).unwrap();
    for re in reynolds_levels(20., 80., 20.) {
        let cp = format!("data/cylinder_re{:03.0}.json", re);
        if Path::new(&cp).exists() {
            println!("Skip Re: {:?}", re);
            let config = config.clone().with_reynolds(re);
            flow = FlowVariant::from_checkpoint(Path::new(&cp), &config).unwrap();
            continue;
        }
        flow.set_reynolds(re).unwrap();
        flow.solve_steady().unwrap();
        flow.save_checkpoint(Path::new(&cp)).unwrap();
        let obs = flow.collect_observations().unwrap().flatten();
        println!("Re {:5.1}  CL {:10.3e}  CD {:8.4}", re, obs[0], obs[1]);
    }

    // Magnus effect at the last Reynolds number
    for omega in [-0.5, 0.5].iter() {
        flow.set_control(&[*omega]).unwrap();
        flow.solve_steady().unwrap();
        let obs = flow.collect_observations().unwrap().flatten();
        println!("omega {:5.2}  CL {:10.3e}  CD {:8.4}", omega, obs[0], obs[1]);
    }
}
