use super::{Engine, RampMetering, SpeedBoundary, Var};
use crate::simulation::SimulationConfig;
use rand::distributions::{Distribution, Uniform};
use rand_distr::Normal;

/// Initialisation strategy for fresh variables created by [`NumericEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarInit {
    Zeros,
    Fill(f64),
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
}

/// Plain floating-point implementation of the METANET formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericEngine {
    var_init: VarInit,
}

impl NumericEngine {
    pub fn new(var_init: VarInit) -> Self {
        Self { var_init }
    }
}

impl Default for NumericEngine {
    fn default() -> Self {
        Self::new(VarInit::Zeros)
    }
}

impl Engine for NumericEngine {
    fn var(&self, _name: &str, n: usize) -> Var {
        match self.var_init {
            VarInit::Zeros => Var::zeros(n),
            VarInit::Fill(value) => Var::from_elem(n, value),
            VarInit::Uniform { low, high } => {
                let dist = Uniform::new(low, high);
                let mut rng = rand::thread_rng();
                Var::from_shape_fn(n, |_| dist.sample(&mut rng))
            }
            VarInit::Normal { mean, std_dev } => match Normal::new(mean, std_dev) {
                Ok(dist) => {
                    let mut rng = rand::thread_rng();
                    Var::from_shape_fn(n, |_| dist.sample(&mut rng))
                }
                // a degenerate deviation collapses to the mean
                Err(_) => Var::from_elem(n, mean),
            },
        }
    }

    fn vcat(&self, parts: &[f64]) -> Var {
        Var::from_vec(parts.to_vec())
    }

    fn downstream_density(&self, rho_firsts: &Var) -> f64 {
        rho_firsts.mapv(|rho| rho * rho).sum() / rho_firsts.sum()
    }

    fn upstream_speed(&self, q_lasts: &Var, v_lasts: &Var) -> f64 {
        (v_lasts * q_lasts).sum() / q_lasts.sum()
    }

    fn upstream_flow(
        &self,
        q_up: f64,
        turn_rate: f64,
        turn_rates: &Var,
        q_origin: f64,
        q_destination: Option<f64>,
    ) -> f64 {
        let mut total = q_up + q_origin;
        if let Some(q) = q_destination {
            total -= q;
        }
        (turn_rate / turn_rates.sum()) * total
    }

    fn congestion_free_downstream_density(&self, rho_last: f64, rho_crit: f64) -> f64 {
        rho_last.min(rho_crit)
    }

    fn congested_downstream_density(&self, rho_last: f64, scenario: f64, rho_crit: f64) -> f64 {
        rho_last.min(rho_crit).max(scenario)
    }

    fn link_flow(&self, density: &Var, speed: &Var, lanes: f64) -> Var {
        (density * speed) * lanes
    }

    fn equilibrium_speed(&self, density: &Var, v_free: f64, rho_crit: f64, a: f64) -> Var {
        density.mapv(|rho| v_free * (-(rho / rho_crit).powf(a) / a).exp())
    }

    fn step_density(
        &self,
        density: &Var,
        flow: &Var,
        flow_up: &Var,
        lanes: f64,
        segment_length: f64,
        time_step: f64,
    ) -> Var {
        density + &((flow_up - flow) * (time_step / (lanes * segment_length)))
    }

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
    ) -> Var {
        let t = config.time_step;
        let relaxation = (v_eq - speed) * (t / config.tau);
        let convection = (speed_up - speed) * speed * (t / segment_length);
        let anticipation = ((density_down - density) / ((density + config.kappa) * segment_length))
            * (config.eta * t / config.tau);
        let mut next = speed + &relaxation + &convection - &anticipation;
        if let Some(q_ramp) = boundary.ramp_flow {
            next[0] -= (config.delta * t * q_ramp * speed[0])
                / (segment_length * lanes * (density[0] + config.kappa));
        }
        if let Some(lane_drop) = boundary.lane_drop {
            let m = next.len() - 1;
            next[m] -= (config.phi * t * lane_drop * density[m] * speed[m].powi(2))
                / (segment_length * lanes * rho_crit);
        }
        next
    }

    fn step_queue(&self, queue: f64, demand: f64, flow: f64, time_step: f64) -> f64 {
        queue + time_step * (demand - flow)
    }

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
    ) -> f64 {
        let sending = demand + queue / time_step;
        let headroom = (rho_max - rho_first) / (rho_max - rho_crit);
        match metering {
            RampMetering::CapacityFraction => sending.min(capacity * rate.min(headroom)),
            RampMetering::FlowFraction => rate * sending.min(capacity * headroom.min(1.0)),
        }
    }

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
    ) -> f64 {
        let sending = demand + queue / time_step;
        let limit = capacity * ((rho_max - rho_first) / (rho_max - rho_crit)).min(1.0);
        desired_flow.min(sending.min(limit))
    }
}
