use crate::simulation::SimulationConfig;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

mod numeric;

pub use numeric::{NumericEngine, VarInit};

/// Scalar-or-vector quantity handled by the computation backend.
pub type Var = Array1<f64>;

/// Where the metering rate enters the on-ramp flow equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampMetering {
    /// The rate caps the capacity term of the ramp.
    CapacityFraction,
    /// The rate scales the whole sending flow of the ramp.
    FlowFraction,
}

/// Optional boundary terms entering the speed update of a single link.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SpeedBoundary {
    /// Flow merging from an on-ramp at the link's first segment.
    pub ramp_flow: Option<f64>,
    /// Lanes lost at the link's downstream end.
    pub lane_drop: Option<f64>,
}

/// Closed-form METANET formulas evaluated by a computation backend.
///
/// The network elements call into this interface for every derived quantity,
/// keeping the model equations swappable behind a single seam.
pub trait Engine {
    /// Creates a fresh placeholder vector of length `n`.
    fn var(&self, name: &str, n: usize) -> Var;

    /// Concatenates scalars into a vector, preserving order.
    fn vcat(&self, parts: &[f64]) -> Var;

    /// Single virtual density seen upstream of a bifurcation, combining the
    /// candidate densities of all downstream branches. The most congested
    /// branch dominates the backward propagation of congestion.
    fn downstream_density(&self, rho_firsts: &Var) -> f64;

    /// Flow-weighted average speed of merging upstream flows.
    fn upstream_speed(&self, q_lasts: &Var, v_lasts: &Var) -> f64;

    /// Turn-rate-proportional share of the total inflow owed to one exiting
    /// branch, net of any flow claimed by a destination.
    fn upstream_flow(
        &self,
        q_up: f64,
        turn_rate: f64,
        turn_rates: &Var,
        q_origin: f64,
        q_destination: Option<f64>,
    ) -> f64;

    /// Downstream density induced by an unobstructed exit.
    fn congestion_free_downstream_density(&self, rho_last: f64, rho_crit: f64) -> f64;

    /// Downstream density induced by a congestion scenario `scenario`.
    fn congested_downstream_density(&self, rho_last: f64, scenario: f64, rho_crit: f64) -> f64;

    /// Flow leaving the highway via an off-ramp. The ramp competes for the
    /// upstream flow as one more branch in the turn-rate split, so its own
    /// turn rate must be part of `turn_rates`.
    fn offramp_flow(&self, ramp_turn_rate: f64, turn_rates: &Var, q_up: f64, q_origin: f64) -> f64 {
        self.upstream_flow(q_up, ramp_turn_rate, turn_rates, q_origin, None)
    }

    /// Per-segment flow of a link.
    fn link_flow(&self, density: &Var, speed: &Var, lanes: f64) -> Var;

    /// Equilibrium speed of a link.
    fn equilibrium_speed(&self, density: &Var, v_free: f64, rho_crit: f64, a: f64) -> Var;

    /// Steps the densities of a link by one time step.
    fn step_density(
        &self,
        density: &Var,
        flow: &Var,
        flow_up: &Var,
        lanes: f64,
        segment_length: f64,
        time_step: f64,
    ) -> Var;

    /// Steps the speeds of a link by one time step.
    #[allow(clippy::too_many_arguments)]
    fn step_speed(
        &self,
        speed: &Var,
        speed_up: &Var,
        density: &Var,
        density_down: &Var,
        v_eq: &Var,
        lanes: f64,
        segment_length: f64,
        rho_crit: f64,
        boundary: &SpeedBoundary,
        config: &SimulationConfig,
    ) -> Var;

    /// Steps an on-ramp queue by one time step.
    fn step_queue(&self, queue: f64, demand: f64, flow: f64, time_step: f64) -> f64;

    /// Flow entering the highway from a metered on-ramp.
    #[allow(clippy::too_many_arguments)]
    fn ramp_flow(
        &self,
        demand: f64,
        queue: f64,
        capacity: f64,
        rate: f64,
        rho_max: f64,
        rho_first: f64,
        rho_crit: f64,
        time_step: f64,
        metering: RampMetering,
    ) -> f64;

    /// Flow entering the highway from a ramp whose desired flow is the
    /// control action itself.
    #[allow(clippy::too_many_arguments)]
    fn simplified_ramp_flow(
        &self,
        desired_flow: f64,
        demand: f64,
        queue: f64,
        capacity: f64,
        rho_max: f64,
        rho_first: f64,
        rho_crit: f64,
        time_step: f64,
    ) -> f64;
}
