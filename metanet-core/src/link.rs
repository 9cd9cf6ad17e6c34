use crate::engine::{Engine, SpeedBoundary, Var};
use crate::network::Network;
use crate::node::{ElementMeta, NodeIndex};
use crate::simulation::SimulationConfig;
use crate::state::{LinkState, NetworkState};
use crate::MetanetError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct LinkIndex(usize);

impl Deref for LinkIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for LinkIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical parameters of a stretch of highway with homogeneous
/// characteristics (same number of lanes, same speed limit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkParameters {
    /// Number of discretisation segments.
    pub num_segments: usize,
    /// Number of lanes.
    pub lanes: f64,
    /// Length of each segment, in km.
    pub segment_length: f64,
    /// Maximum (jam) density, in veh/km/lane.
    pub max_density: f64,
    /// Critical density at which flow is maximal, in veh/km/lane.
    pub critical_density: f64,
    /// Free-flow speed, in km/h.
    pub free_flow_speed: f64,
    /// Exponent of the equilibrium speed equation.
    pub speed_exponent: f64,
    /// Fraction of the upstream flow routed onto this link at its origin
    /// node. Only relevant when sibling links exit the same node; needs not
    /// be normalised across them.
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f64,
    /// Lanes lost at the downstream end of the link, if any.
    #[serde(default)]
    pub lane_drop: Option<f64>,
}

fn default_turn_rate() -> f64 {
    1.0
}

/// Directed stretch of highway between two nodes.
#[derive(Debug, PartialEq)]
pub struct Link {
    meta: ElementMeta<LinkIndex>,
    from_node: NodeIndex,
    to_node: NodeIndex,
    parameters: LinkParameters,
}

impl Link {
    pub(crate) fn new(
        index: &LinkIndex,
        name: &str,
        from_node: NodeIndex,
        to_node: NodeIndex,
        parameters: LinkParameters,
    ) -> Self {
        Self {
            meta: ElementMeta::new(index, name),
            from_node,
            to_node,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    pub fn index(&self) -> LinkIndex {
        *self.meta.index()
    }

    pub fn from_node(&self) -> NodeIndex {
        self.from_node
    }

    pub fn to_node(&self) -> NodeIndex {
        self.to_node
    }

    pub fn parameters(&self) -> &LinkParameters {
        &self.parameters
    }

    pub fn turn_rate(&self) -> f64 {
        self.parameters.turn_rate
    }

    pub fn num_segments(&self) -> usize {
        self.parameters.num_segments
    }

    /// Per-segment flow of the link.
    pub fn flow(&self, state: &NetworkState, engine: &dyn Engine) -> Result<Var, MetanetError> {
        let link_state = state.link(self.index())?;
        Ok(engine.link_flow(&link_state.density, &link_state.speed, self.parameters.lanes))
    }

    /// Flow leaving the link through its last segment.
    pub fn last_flow(&self, state: &NetworkState, engine: &dyn Engine) -> Result<f64, MetanetError> {
        let flow = self.flow(state, engine)?;
        Ok(flow[flow.len() - 1])
    }

    /// One METANET update of the link's densities and speeds.
    ///
    /// The downstream node supplies the virtual boundary density and the
    /// upstream node the virtual boundary speed and flow; interior segments
    /// read their neighbours directly.
    pub fn step(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
    ) -> Result<LinkState, MetanetError> {
        let link_state = state.link(self.index())?;
        let node_up = network.nodes().get(&self.from_node)?;
        let node_down = network.nodes().get(&self.to_node)?;

        let density_down = node_down.get_downstream_density(network, state, engine)?;
        let (speed_up, flow_up) =
            node_up.get_upstream_speed_and_flow(network, state, engine, self.index(), config)?;

        let flow = engine.link_flow(&link_state.density, &link_state.speed, self.parameters.lanes);
        let flow_up_cells = shifted_in(flow_up, &flow);
        let speed_up_cells = shifted_in(speed_up, &link_state.speed);
        let density_down_cells = shifted_out(&link_state.density, density_down);

        let v_eq = engine.equilibrium_speed(
            &link_state.density,
            self.parameters.free_flow_speed,
            self.parameters.critical_density,
            self.parameters.speed_exponent,
        );

        // an on-ramp merging into an existing mainstream slows the first
        // segment; a ramp that is the sole inflow is already the boundary
        let ramp_flow = match network.origin_at(self.from_node) {
            Some(origin_index) if !network.in_links(self.from_node)?.is_empty() => {
                let origin = network.origins().get(&origin_index)?;
                if origin.is_ramp() {
                    Some(origin.get_flow(network, state, engine, config)?)
                } else {
                    None
                }
            }
            _ => None,
        };
        let boundary = SpeedBoundary {
            ramp_flow,
            lane_drop: self.parameters.lane_drop,
        };

        let density = engine.step_density(
            &link_state.density,
            &flow,
            &flow_up_cells,
            self.parameters.lanes,
            self.parameters.segment_length,
            config.time_step,
        );
        let speed = engine.step_speed(
            &link_state.speed,
            &speed_up_cells,
            &link_state.density,
            &density_down_cells,
            &v_eq,
            self.parameters.lanes,
            self.parameters.segment_length,
            self.parameters.critical_density,
            &boundary,
            config,
        );
        Ok(LinkState::new(density, speed))
    }
}

/// `[boundary, values[0], .., values[n - 2]]`
fn shifted_in(boundary: f64, values: &Var) -> Var {
    let mut out = Var::zeros(values.len());
    out[0] = boundary;
    for i in 1..values.len() {
        out[i] = values[i - 1];
    }
    out
}

/// `[values[1], .., values[n - 1], boundary]`
fn shifted_out(values: &Var, boundary: f64) -> Var {
    let n = values.len();
    let mut out = Var::zeros(n);
    for i in 0..n - 1 {
        out[i] = values[i + 1];
    }
    out[n - 1] = boundary;
    out
}

#[derive(Default)]
pub struct LinkVec {
    links: Vec<Link>,
}

impl Deref for LinkVec {
    type Target = Vec<Link>;

    fn deref(&self) -> &Self::Target {
        &self.links
    }
}

impl DerefMut for LinkVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.links
    }
}

impl LinkVec {
    pub fn get(&self, index: &LinkIndex) -> Result<&Link, MetanetError> {
        self.links
            .get(index.0)
            .ok_or(MetanetError::LinkIndexNotFound { index: *index })
    }

    pub fn get_mut(&mut self, index: &LinkIndex) -> Result<&mut Link, MetanetError> {
        self.links
            .get_mut(index.0)
            .ok_or(MetanetError::LinkIndexNotFound { index: *index })
    }

    pub fn push_new(
        &mut self,
        name: &str,
        from_node: NodeIndex,
        to_node: NodeIndex,
        parameters: LinkParameters,
    ) -> LinkIndex {
        let link_index = LinkIndex(self.links.len());
        self.links
            .push(Link::new(&link_index, name, from_node, to_node, parameters));
        link_index
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, NumericEngine};
    use crate::simulation::SimulationConfig;
    use crate::test_utils::{assert_approx_array_eq, simple_network, uniform_state};
    use float_cmp::assert_approx_eq;

    #[test]
    fn flow_uses_all_lanes() {
        let network = simple_network();
        let engine = NumericEngine::default();
        let state = uniform_state(&network, &engine, 20.0, 80.0);
        let link = network.get_link_by_name("L1").unwrap();

        let flow = link.flow(&state, &engine).unwrap();
        assert_eq!(flow.len(), link.num_segments());
        for q in flow.iter() {
            assert_approx_eq!(f64, *q, 20.0 * 80.0 * 3.0);
        }
        assert_approx_eq!(f64, link.last_flow(&state, &engine).unwrap(), 4800.0);
    }

    #[test]
    fn uniform_free_flow_keeps_density_and_relaxes_speed() {
        let network = simple_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let state = uniform_state(&network, &engine, 20.0, 80.0);
        let link = network.get_link_by_name("L1").unwrap();

        let next = link.step(&network, &state, &engine, &config).unwrap();

        // all boundary flows match the interior, so no vehicles accumulate
        assert_approx_array_eq(&next.density, &state.link(link.index()).unwrap().density);
        // speeds relax towards the equilibrium speed of the current density
        let v_eq = engine.equilibrium_speed(
            &state.link(link.index()).unwrap().density,
            link.parameters().free_flow_speed,
            link.parameters().critical_density,
            link.parameters().speed_exponent,
        );
        for (v, v_eq) in next.speed.iter().zip(v_eq.iter()) {
            if *v_eq > 80.0 {
                assert!(*v > 80.0 && *v < *v_eq);
            } else {
                assert!(*v < 80.0 && *v > *v_eq);
            }
        }
    }

    #[test]
    fn step_does_not_mutate_the_input_state() {
        let network = simple_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let state = uniform_state(&network, &engine, 20.0, 80.0);
        let link = network.get_link_by_name("L1").unwrap();

        let before = state.clone();
        let first = link.step(&network, &state, &engine, &config).unwrap();
        let second = link.step(&network, &state, &engine, &config).unwrap();
        assert_eq!(state, before);
        assert_eq!(first, second);
    }
}
