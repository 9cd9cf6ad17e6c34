use crate::engine::{Engine, Var};
use crate::link::LinkIndex;
use crate::network::Network;
use crate::node::{ElementMeta, NodeIndex};
use crate::simulation::SimulationConfig;
use crate::state::NetworkState;
use crate::MetanetError;
use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct DestinationIndex(usize);

impl Deref for DestinationIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for DestinationIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exit point draining traffic from a node.
///
/// Free-flow and congestion-scenario destinations are terminal boundaries
/// inducing a downstream density on their entering link; the off-ramp
/// instead competes for a share of the node's flow split and induces no
/// terminal density.
#[derive(Debug, PartialEq)]
pub enum Destination {
    FreeFlow(FreeFlowDestination),
    Congested(CongestedDestination),
    OffRamp(OffRampDestination),
}

/// Ideal congestion-free exit: vehicles leave the highway unobstructed and
/// no downstream congestion propagates back.
#[derive(Debug, PartialEq)]
pub struct FreeFlowDestination {
    meta: ElementMeta<DestinationIndex>,
    node: NodeIndex,
}

/// Exit with an imposed downstream density scenario, so that congestion can
/// spill back into the network.
#[derive(Debug, PartialEq)]
pub struct CongestedDestination {
    meta: ElementMeta<DestinationIndex>,
    node: NodeIndex,
    scenario: Option<f64>,
}

/// Unmetered off-ramp: incoming vehicles leave via the ramp or continue on
/// the exiting links, according to the respective turn rates.
#[derive(Debug, PartialEq)]
pub struct OffRampDestination {
    meta: ElementMeta<DestinationIndex>,
    node: NodeIndex,
    turn_rate: f64,
}

impl Destination {
    pub(crate) fn new_free_flow(index: &DestinationIndex, name: &str, node: NodeIndex) -> Self {
        Self::FreeFlow(FreeFlowDestination {
            meta: ElementMeta::new(index, name),
            node,
        })
    }

    pub(crate) fn new_congested(
        index: &DestinationIndex,
        name: &str,
        node: NodeIndex,
        scenario: Option<f64>,
    ) -> Self {
        Self::Congested(CongestedDestination {
            meta: ElementMeta::new(index, name),
            node,
            scenario,
        })
    }

    pub(crate) fn new_off_ramp(
        index: &DestinationIndex,
        name: &str,
        node: NodeIndex,
        turn_rate: f64,
    ) -> Self {
        Self::OffRamp(OffRampDestination {
            meta: ElementMeta::new(index, name),
            node,
            turn_rate,
        })
    }

    fn meta(&self) -> &ElementMeta<DestinationIndex> {
        match self {
            Self::FreeFlow(destination) => &destination.meta,
            Self::Congested(destination) => &destination.meta,
            Self::OffRamp(destination) => &destination.meta,
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name()
    }

    pub fn index(&self) -> DestinationIndex {
        *self.meta().index()
    }

    pub fn node(&self) -> NodeIndex {
        match self {
            Self::FreeFlow(destination) => destination.node,
            Self::Congested(destination) => destination.node,
            Self::OffRamp(destination) => destination.node,
        }
    }

    /// Whether this destination claims a share of the node's flow split.
    /// This is a fixed trait of the variant, not a runtime flag.
    pub fn demands_flow(&self) -> bool {
        matches!(self, Self::OffRamp(_))
    }

    pub fn as_off_ramp(&self) -> Option<&OffRampDestination> {
        match self {
            Self::OffRamp(ramp) => Some(ramp),
            _ => None,
        }
    }

    /// Terminal density this destination contributes to the node's
    /// downstream boundary, or `None` for off-ramps, which participate only
    /// in the flow split.
    pub fn density_contribution(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
    ) -> Result<Option<f64>, MetanetError> {
        match self {
            Self::OffRamp(_) => Ok(None),
            _ => self.get_density(network, state, engine).map(Some),
        }
    }

    /// Virtual downstream density induced on the unique entering link.
    pub fn get_density(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
    ) -> Result<f64, MetanetError> {
        let link_index = entering_link(network, self.node(), self.name())?;
        let link = network.links().get(&link_index)?;
        let rho_last = state.link(link_index)?.last_density();
        let rho_crit = link.parameters().critical_density;
        match self {
            Self::FreeFlow(_) => Ok(engine.congestion_free_downstream_density(rho_last, rho_crit)),
            Self::Congested(_) => {
                let scenario = state
                    .destination(self.index())?
                    .scenario_density
                    .ok_or_else(|| MetanetError::StateMismatch {
                        element: self.name().to_string(),
                    })?;
                Ok(engine.congested_downstream_density(rho_last, scenario, rho_crit))
            }
            Self::OffRamp(_) => Err(MetanetError::OffRampHasNoDensity {
                destination: self.name().to_string(),
            }),
        }
    }

    /// Flow claimed by the destination, for variants that demand one.
    pub fn get_flow(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
        q_up: Option<f64>,
        q_origin: Option<f64>,
        turn_rates_down: Option<&Var>,
    ) -> Result<f64, MetanetError> {
        match self {
            Self::OffRamp(ramp) => {
                ramp.get_flow(network, state, engine, config, q_up, q_origin, turn_rates_down)
            }
            _ => Err(MetanetError::DestinationCannotDemandFlow {
                destination: self.name().to_string(),
            }),
        }
    }
}

impl CongestedDestination {
    /// Scenario density supplied at construction, if any. When absent, a
    /// fresh variable is created for it when the network state is built.
    pub fn scenario(&self) -> Option<f64> {
        self.scenario
    }
}

impl OffRampDestination {
    pub fn turn_rate(&self) -> f64 {
        self.turn_rate
    }

    /// Volume of traffic that exits via this ramp rather than continuing on
    /// the highway.
    ///
    /// Arguments not supplied are derived from the network: `q_up` from the
    /// entering link's last-segment flow, `q_origin` from an origin attached
    /// to the same node (zero if none) and `turn_rates_down` from the node's
    /// exiting links. The ramp's own turn rate is appended before the split,
    /// making the ramp one more branch competing for the upstream flow.
    pub fn get_flow(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
        q_up: Option<f64>,
        q_origin: Option<f64>,
        turn_rates_down: Option<&Var>,
    ) -> Result<f64, MetanetError> {
        let q_up = match q_up {
            Some(flow) => flow,
            None => {
                let link_index = entering_link(network, self.node, self.meta.name())?;
                network.links().get(&link_index)?.last_flow(state, engine)?
            }
        };
        let q_origin = match q_origin {
            Some(flow) => flow,
            None => match network.origin_at(self.node) {
                Some(origin_index) => network
                    .origins()
                    .get(&origin_index)?
                    .get_flow(network, state, engine, config)?,
                None => 0.0,
            },
        };
        let mut turn_rates = match turn_rates_down {
            Some(rates) => rates.to_vec(),
            None => {
                let links_down = network.out_links(self.node)?;
                let mut rates = Vec::with_capacity(links_down.len() + 1);
                for (_, _, link_index) in &links_down {
                    rates.push(network.links().get(link_index)?.turn_rate());
                }
                rates
            }
        };
        turn_rates.push(self.turn_rate);
        let turn_rates = engine.vcat(&turn_rates);
        Ok(engine.offramp_flow(self.turn_rate, &turn_rates, q_up, q_origin))
    }
}

/// The unique link entering the destination's node.
fn entering_link(
    network: &Network,
    node: NodeIndex,
    destination: &str,
) -> Result<LinkIndex, MetanetError> {
    let links = network.in_links(node)?;
    if links.len() != 1 {
        return Err(MetanetError::DestinationEnteringLinks {
            destination: destination.to_string(),
            count: links.len(),
        });
    }
    Ok(links[0].2)
}

#[derive(Default)]
pub struct DestinationVec {
    destinations: Vec<Destination>,
}

impl Deref for DestinationVec {
    type Target = Vec<Destination>;

    fn deref(&self) -> &Self::Target {
        &self.destinations
    }
}

impl DerefMut for DestinationVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.destinations
    }
}

impl DestinationVec {
    pub fn get(&self, index: &DestinationIndex) -> Result<&Destination, MetanetError> {
        self.destinations
            .get(index.0)
            .ok_or(MetanetError::DestinationIndexNotFound { index: *index })
    }

    pub fn get_mut(&mut self, index: &DestinationIndex) -> Result<&mut Destination, MetanetError> {
        self.destinations
            .get_mut(index.0)
            .ok_or(MetanetError::DestinationIndexNotFound { index: *index })
    }

    pub fn push_new_free_flow(&mut self, name: &str, node: NodeIndex) -> DestinationIndex {
        let destination_index = DestinationIndex(self.destinations.len());
        self.destinations
            .push(Destination::new_free_flow(&destination_index, name, node));
        destination_index
    }

    pub fn push_new_congested(
        &mut self,
        name: &str,
        node: NodeIndex,
        scenario: Option<f64>,
    ) -> DestinationIndex {
        let destination_index = DestinationIndex(self.destinations.len());
        self.destinations.push(Destination::new_congested(
            &destination_index,
            name,
            node,
            scenario,
        ));
        destination_index
    }

    pub fn push_new_off_ramp(
        &mut self,
        name: &str,
        node: NodeIndex,
        turn_rate: f64,
    ) -> DestinationIndex {
        let destination_index = DestinationIndex(self.destinations.len());
        self.destinations.push(Destination::new_off_ramp(
            &destination_index,
            name,
            node,
            turn_rate,
        ));
        destination_index
    }
}
