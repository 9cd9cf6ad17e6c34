use serde::{Deserialize, Serialize};

/// Global constants of the METANET model equations.
///
/// Times are expressed in hours, densities in veh/km/lane, flows in veh/h
/// and speeds in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation time step `T`.
    pub time_step: f64,
    /// Driver reaction time `tau`.
    pub tau: f64,
    /// Anticipation constant `eta`.
    pub eta: f64,
    /// Smoothing density constant `kappa`.
    pub kappa: f64,
    /// On-ramp merging constant `delta`.
    pub delta: f64,
    /// Lane-drop weaving constant `phi`.
    pub phi: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: 10.0 / 3600.0,
            tau: 18.0 / 3600.0,
            eta: 60.0,
            kappa: 40.0,
            delta: 0.0122,
            phi: 1.0,
        }
    }
}
