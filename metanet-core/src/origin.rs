use crate::engine::{Engine, RampMetering};
use crate::link::LinkIndex;
use crate::network::Network;
use crate::node::{ElementMeta, NodeIndex};
use crate::simulation::SimulationConfig;
use crate::state::{NetworkState, OriginState};
use crate::MetanetError;
use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct OriginIndex(usize);

impl Deref for OriginIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for OriginIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry point feeding traffic into a node.
#[derive(Debug, PartialEq)]
pub enum Origin {
    Mainstream(MainstreamOrigin),
    MeteredRamp(MeteredRamp),
    SimpleMeteredRamp(SimpleMeteredRamp),
}

/// Ideal state-less origin conveying to the exiting link as much flow as the
/// flow already in that link.
#[derive(Debug, PartialEq)]
pub struct MainstreamOrigin {
    meta: ElementMeta<OriginIndex>,
    node: NodeIndex,
}

/// On-ramp where vehicles queue up before being metered onto the highway.
#[derive(Debug, PartialEq)]
pub struct MeteredRamp {
    meta: ElementMeta<OriginIndex>,
    node: NodeIndex,
    capacity: f64,
    metering: RampMetering,
}

/// On-ramp whose desired flow is the control action itself, instead of a
/// metering rate.
#[derive(Debug, PartialEq)]
pub struct SimpleMeteredRamp {
    meta: ElementMeta<OriginIndex>,
    node: NodeIndex,
    capacity: f64,
}

impl Origin {
    pub(crate) fn new_mainstream(index: &OriginIndex, name: &str, node: NodeIndex) -> Self {
        Self::Mainstream(MainstreamOrigin {
            meta: ElementMeta::new(index, name),
            node,
        })
    }

    pub(crate) fn new_metered_ramp(
        index: &OriginIndex,
        name: &str,
        node: NodeIndex,
        capacity: f64,
        metering: RampMetering,
    ) -> Self {
        Self::MeteredRamp(MeteredRamp {
            meta: ElementMeta::new(index, name),
            node,
            capacity,
            metering,
        })
    }

    pub(crate) fn new_simple_metered_ramp(
        index: &OriginIndex,
        name: &str,
        node: NodeIndex,
        capacity: f64,
    ) -> Self {
        Self::SimpleMeteredRamp(SimpleMeteredRamp {
            meta: ElementMeta::new(index, name),
            node,
            capacity,
        })
    }

    fn meta(&self) -> &ElementMeta<OriginIndex> {
        match self {
            Self::Mainstream(origin) => &origin.meta,
            Self::MeteredRamp(origin) => &origin.meta,
            Self::SimpleMeteredRamp(origin) => &origin.meta,
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name()
    }

    pub fn index(&self) -> OriginIndex {
        *self.meta().index()
    }

    pub fn node(&self) -> NodeIndex {
        match self {
            Self::Mainstream(origin) => origin.node,
            Self::MeteredRamp(origin) => origin.node,
            Self::SimpleMeteredRamp(origin) => origin.node,
        }
    }

    /// Whether this origin is a ramp merging into the highway. Only ramps
    /// may feed a node that also has entering links.
    pub fn is_ramp(&self) -> bool {
        !matches!(self, Self::Mainstream(_))
    }

    /// Speed at which traffic enters the exiting link.
    pub fn get_speed(&self, network: &Network, state: &NetworkState) -> Result<f64, MetanetError> {
        let link_index = self.exiting_link(network)?;
        Ok(state.link(link_index)?.first_speed())
    }

    /// Flow this origin pushes into the exiting link.
    pub fn get_flow(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
    ) -> Result<f64, MetanetError> {
        let link_index = self.exiting_link(network)?;
        let link = network.links().get(&link_index)?;
        match self {
            Self::Mainstream(_) => {
                let flow = link.flow(state, engine)?;
                Ok(flow[0])
            }
            Self::MeteredRamp(ramp) => {
                let ramp_state = *state
                    .origin(self.index())?
                    .metered_ramp()
                    .ok_or_else(|| MetanetError::StateMismatch {
                        element: self.name().to_string(),
                    })?;
                let parameters = link.parameters();
                Ok(engine.ramp_flow(
                    ramp_state.demand,
                    ramp_state.queue,
                    ramp.capacity,
                    ramp_state.metering_rate,
                    parameters.max_density,
                    state.link(link_index)?.first_density(),
                    parameters.critical_density,
                    config.time_step,
                    ramp.metering,
                ))
            }
            Self::SimpleMeteredRamp(ramp) => {
                let ramp_state = *state
                    .origin(self.index())?
                    .simple_metered_ramp()
                    .ok_or_else(|| MetanetError::StateMismatch {
                        element: self.name().to_string(),
                    })?;
                let parameters = link.parameters();
                Ok(engine.simplified_ramp_flow(
                    ramp_state.desired_flow,
                    ramp_state.demand,
                    ramp_state.queue,
                    ramp.capacity,
                    parameters.max_density,
                    state.link(link_index)?.first_density(),
                    parameters.critical_density,
                    config.time_step,
                ))
            }
        }
    }

    /// Steps the origin's queue dynamics, returning its next state.
    pub fn step(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
    ) -> Result<OriginState, MetanetError> {
        match self {
            Self::Mainstream(_) => Ok(OriginState::Mainstream),
            Self::MeteredRamp(_) => {
                let flow = self.get_flow(network, state, engine, config)?;
                let mut ramp_state = *state
                    .origin(self.index())?
                    .metered_ramp()
                    .ok_or_else(|| MetanetError::StateMismatch {
                        element: self.name().to_string(),
                    })?;
                ramp_state.queue =
                    engine.step_queue(ramp_state.queue, ramp_state.demand, flow, config.time_step);
                Ok(OriginState::MeteredRamp(ramp_state))
            }
            Self::SimpleMeteredRamp(_) => {
                let flow = self.get_flow(network, state, engine, config)?;
                let mut ramp_state = *state
                    .origin(self.index())?
                    .simple_metered_ramp()
                    .ok_or_else(|| MetanetError::StateMismatch {
                        element: self.name().to_string(),
                    })?;
                ramp_state.queue =
                    engine.step_queue(ramp_state.queue, ramp_state.demand, flow, config.time_step);
                Ok(OriginState::SimpleMeteredRamp(ramp_state))
            }
        }
    }

    /// The unique link exiting the origin's node.
    fn exiting_link(&self, network: &Network) -> Result<LinkIndex, MetanetError> {
        let links = network.out_links(self.node())?;
        if links.len() != 1 {
            return Err(MetanetError::OriginExitingLinks {
                origin: self.name().to_string(),
                count: links.len(),
            });
        }
        Ok(links[0].2)
    }
}

#[derive(Default)]
pub struct OriginVec {
    origins: Vec<Origin>,
}

impl Deref for OriginVec {
    type Target = Vec<Origin>;

    fn deref(&self) -> &Self::Target {
        &self.origins
    }
}

impl DerefMut for OriginVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.origins
    }
}

impl OriginVec {
    pub fn get(&self, index: &OriginIndex) -> Result<&Origin, MetanetError> {
        self.origins
            .get(index.0)
            .ok_or(MetanetError::OriginIndexNotFound { index: *index })
    }

    pub fn get_mut(&mut self, index: &OriginIndex) -> Result<&mut Origin, MetanetError> {
        self.origins
            .get_mut(index.0)
            .ok_or(MetanetError::OriginIndexNotFound { index: *index })
    }

    pub fn push_new_mainstream(&mut self, name: &str, node: NodeIndex) -> OriginIndex {
        let origin_index = OriginIndex(self.origins.len());
        self.origins
            .push(Origin::new_mainstream(&origin_index, name, node));
        origin_index
    }

    pub fn push_new_metered_ramp(
        &mut self,
        name: &str,
        node: NodeIndex,
        capacity: f64,
        metering: RampMetering,
    ) -> OriginIndex {
        let origin_index = OriginIndex(self.origins.len());
        self.origins.push(Origin::new_metered_ramp(
            &origin_index,
            name,
            node,
            capacity,
            metering,
        ));
        origin_index
    }

    pub fn push_new_simple_metered_ramp(
        &mut self,
        name: &str,
        node: NodeIndex,
        capacity: f64,
    ) -> OriginIndex {
        let origin_index = OriginIndex(self.origins.len());
        self.origins
            .push(Origin::new_simple_metered_ramp(&origin_index, name, node, capacity));
        origin_index
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::NumericEngine;
    use crate::simulation::SimulationConfig;
    use crate::state::OriginState;
    use crate::test_utils::{merge_network, simple_network, uniform_state};
    use float_cmp::assert_approx_eq;

    #[test]
    fn mainstream_origin_mirrors_its_link() {
        let network = simple_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let state = uniform_state(&network, &engine, 20.0, 80.0);

        let origin_index = network.get_origin_index_by_name("O1").unwrap();
        let origin = network.origins().get(&origin_index).unwrap();
        assert!(!origin.is_ramp());
        assert_approx_eq!(f64, origin.get_speed(&network, &state).unwrap(), 80.0);
        assert_approx_eq!(
            f64,
            origin.get_flow(&network, &state, &engine, &config).unwrap(),
            20.0 * 80.0 * 3.0
        );
    }

    #[test]
    fn metered_ramp_flow_follows_demand_and_rate() {
        let network = merge_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let mut state = uniform_state(&network, &engine, 20.0, 80.0);

        let ramp_index = network.get_origin_index_by_name("O3").unwrap();
        let ramp = network.origins().get(&ramp_index).unwrap();
        assert!(ramp.is_ramp());

        // idle ramp sends nothing
        assert_approx_eq!(f64, ramp.get_flow(&network, &state, &engine, &config).unwrap(), 0.0);

        {
            let ramp_state = state.origin_mut(ramp_index).unwrap().metered_ramp_mut().unwrap();
            ramp_state.demand = 1500.0;
            ramp_state.metering_rate = 1.0;
        }
        assert_approx_eq!(
            f64,
            ramp.get_flow(&network, &state, &engine, &config).unwrap(),
            1500.0
        );

        // halving the rate caps the ramp below its demand
        state
            .origin_mut(ramp_index)
            .unwrap()
            .metered_ramp_mut()
            .unwrap()
            .metering_rate = 0.2;
        let flow = ramp.get_flow(&network, &state, &engine, &config).unwrap();
        assert_approx_eq!(f64, flow, 3500.0 * 0.2);
    }

    #[test]
    fn ramp_queue_accumulates_unserved_demand() {
        let network = merge_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let mut state = uniform_state(&network, &engine, 20.0, 80.0);

        let ramp_index = network.get_origin_index_by_name("O3").unwrap();
        {
            let ramp_state = state.origin_mut(ramp_index).unwrap().metered_ramp_mut().unwrap();
            ramp_state.demand = 2000.0;
            ramp_state.metering_rate = 0.2;
        }
        let ramp = network.origins().get(&ramp_index).unwrap();
        let flow = ramp.get_flow(&network, &state, &engine, &config).unwrap();
        let next = ramp.step(&network, &state, &engine, &config).unwrap();
        match next {
            OriginState::MeteredRamp(ramp_state) => {
                assert_approx_eq!(
                    f64,
                    ramp_state.queue,
                    config.time_step * (2000.0 - flow),
                    epsilon = 1e-9
                );
                assert!(ramp_state.queue > 0.0);
            }
            _ => panic!("expected a metered ramp state"),
        }
    }
}
