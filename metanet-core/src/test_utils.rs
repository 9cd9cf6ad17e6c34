//! Helpers for building small networks in tests and benchmarks.

use crate::engine::{Engine, RampMetering, Var};
use crate::link::LinkParameters;
use crate::network::Network;
use crate::state::NetworkState;
use crate::MetanetError;
use float_cmp::{approx_eq, F64Margin};
use rand::Rng;

/// Link parameters of a typical three-lane highway stretch.
pub fn default_parameters() -> LinkParameters {
    LinkParameters {
        num_segments: 4,
        lanes: 3.0,
        segment_length: 1.0,
        max_density: 180.0,
        critical_density: 30.0,
        free_flow_speed: 100.0,
        speed_exponent: 1.8,
        turn_rate: 1.0,
        lane_drop: None,
    }
}

/// Mainstream origin, one link, free-flow destination:
/// `O1 -> N1 -L1-> N2 -> D1`.
pub fn simple_network() -> Network {
    let mut network = Network::new("simple");
    let n1 = network.add_node("N1").expect("fresh network");
    let n2 = network.add_node("N2").expect("fresh network");
    network
        .add_link("L1", n1, n2, default_parameters())
        .expect("fresh network");
    network.add_mainstream_origin("O1", n1).expect("fresh network");
    network.add_free_flow_destination("D1", n2).expect("fresh network");
    network.validate().expect("valid by construction");
    network
}

/// Two entering links and a metered on-ramp merging into one exiting link:
/// `N1 -L1-> J <-L2- N2`, `O3 -> J`, `J -L3-> N3 -> D1`.
pub fn merge_network() -> Network {
    let mut network = Network::new("merge");
    let n1 = network.add_node("N1").expect("fresh network");
    let n2 = network.add_node("N2").expect("fresh network");
    let junction = network.add_node("J").expect("fresh network");
    let n3 = network.add_node("N3").expect("fresh network");
    network
        .add_link("L1", n1, junction, default_parameters())
        .expect("fresh network");
    network
        .add_link("L2", n2, junction, default_parameters())
        .expect("fresh network");
    network
        .add_link("L3", junction, n3, default_parameters())
        .expect("fresh network");
    network.add_mainstream_origin("O1", n1).expect("fresh network");
    network.add_mainstream_origin("O2", n2).expect("fresh network");
    network
        .add_metered_ramp("O3", junction, 3500.0, RampMetering::CapacityFraction)
        .expect("fresh network");
    network.add_free_flow_destination("D1", n3).expect("fresh network");
    network.validate().expect("valid by construction");
    network
}

/// One entering link diverging into two exiting links with turn rates 0.7
/// and 0.3: `O1 -> N1 -L1-> J -L2-> N2 -> D2`, `J -L3-> N3 -> D3`.
pub fn diverge_network() -> Network {
    let mut network = Network::new("diverge");
    let n1 = network.add_node("N1").expect("fresh network");
    let junction = network.add_node("J").expect("fresh network");
    let n2 = network.add_node("N2").expect("fresh network");
    let n3 = network.add_node("N3").expect("fresh network");
    network
        .add_link("L1", n1, junction, default_parameters())
        .expect("fresh network");
    let mut mainline = default_parameters();
    mainline.turn_rate = 0.7;
    network
        .add_link("L2", junction, n2, mainline)
        .expect("fresh network");
    let mut secondary = default_parameters();
    secondary.turn_rate = 0.3;
    network
        .add_link("L3", junction, n3, secondary)
        .expect("fresh network");
    network.add_mainstream_origin("O1", n1).expect("fresh network");
    network.add_free_flow_destination("D2", n2).expect("fresh network");
    network.add_free_flow_destination("D3", n3).expect("fresh network");
    network.validate().expect("valid by construction");
    network
}

/// One entering link, a mainline exit with turn rate 0.7 and an off-ramp
/// with turn rate 0.3: `O1 -> N1 -L1-> J -L2-> N2 -> D2`, `J -> D-ramp`.
pub fn offramp_network() -> Network {
    let mut network = Network::new("offramp");
    let n1 = network.add_node("N1").expect("fresh network");
    let junction = network.add_node("J").expect("fresh network");
    let n2 = network.add_node("N2").expect("fresh network");
    network
        .add_link("L1", n1, junction, default_parameters())
        .expect("fresh network");
    let mut mainline = default_parameters();
    mainline.turn_rate = 0.7;
    network
        .add_link("L2", junction, n2, mainline)
        .expect("fresh network");
    network.add_mainstream_origin("O1", n1).expect("fresh network");
    network
        .add_off_ramp_destination("D-ramp", junction, 0.3)
        .expect("fresh network");
    network.add_free_flow_destination("D2", n2).expect("fresh network");
    network.validate().expect("valid by construction");
    network
}

/// Builds `num_systems` independent origin-link-link-destination chains with
/// randomised parameters, for benchmarks and smoke tests.
pub fn make_random_network<R: Rng>(
    num_systems: usize,
    rng: &mut R,
) -> Result<Network, MetanetError> {
    let mut network = Network::new("random");
    for i in 0..num_systems {
        let suffix = format!("sys-{i:04}");
        let n0 = network.add_node(&format!("N0-{suffix}"))?;
        let n1 = network.add_node(&format!("N1-{suffix}"))?;
        let n2 = network.add_node(&format!("N2-{suffix}"))?;
        for (name, from, to) in [("L0", n0, n1), ("L1", n1, n2)] {
            let parameters = LinkParameters {
                num_segments: rng.gen_range(2..6),
                lanes: rng.gen_range(2..5) as f64,
                segment_length: rng.gen_range(0.5..1.5),
                max_density: rng.gen_range(160.0..200.0),
                critical_density: rng.gen_range(25.0..40.0),
                free_flow_speed: rng.gen_range(90.0..120.0),
                speed_exponent: rng.gen_range(1.5..2.2),
                turn_rate: 1.0,
                lane_drop: None,
            };
            network.add_link(&format!("{name}-{suffix}"), from, to, parameters)?;
        }
        network.add_mainstream_origin(&format!("O-{suffix}"), n0)?;
        network.add_free_flow_destination(&format!("D-{suffix}"), n2)?;
    }
    network.validate()?;
    Ok(network)
}

/// Asserts that two state vectors agree within a small tolerance.
pub fn assert_approx_array_eq(calculated: &Var, expected: &Var) {
    let margins = F64Margin { ulps: 2, epsilon: 1e-8 };
    for (calculated, expected) in calculated.iter().zip(expected.iter()) {
        if !approx_eq!(f64, *calculated, *expected, margins) {
            panic!("Calculated value {calculated} not equal to expected value {expected}.");
        }
    }
}

/// Initial state with every link at the given uniform density and speed.
pub fn uniform_state(
    network: &Network,
    engine: &dyn Engine,
    density: f64,
    speed: f64,
) -> NetworkState {
    let mut state = network.initial_state(engine);
    for link in network.links().iter() {
        let link_state = state
            .link_mut(link.index())
            .expect("state built from the same network");
        link_state.density = Var::from_elem(link.num_segments(), density);
        link_state.speed = Var::from_elem(link.num_segments(), speed);
    }
    state
}
