use crate::engine::Engine;
use crate::link::LinkIndex;
use crate::network::Network;
use crate::simulation::SimulationConfig;
use crate::state::NetworkState;
use crate::MetanetError;
use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct NodeIndex(usize);

impl Deref for NodeIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for NodeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a network element: its index and name.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMeta<T> {
    index: T,
    name: String,
}

impl<T> ElementMeta<T>
where
    T: Copy,
{
    pub(crate) fn new(index: &T, name: &str) -> Self {
        Self {
            index: *index,
            name: name.to_string(),
        }
    }

    pub(crate) fn index(&self) -> &T {
        &self.index
    }

    pub(crate) fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// Junction between links, ramp origins and destinations.
///
/// Nodes separate links where the road characteristics change or where
/// traffic merges or diverges. They carry no physical state of their own:
/// every quantity they report is virtual, derived on demand from the
/// neighbouring elements.
#[derive(Debug, PartialEq)]
pub struct Node {
    meta: ElementMeta<NodeIndex>,
    links_in: Vec<LinkIndex>,
    links_out: Vec<LinkIndex>,
}

impl Node {
    pub(crate) fn new(index: &NodeIndex, name: &str) -> Self {
        Self {
            meta: ElementMeta::new(index, name),
            links_in: Vec::new(),
            links_out: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    pub fn index(&self) -> NodeIndex {
        *self.meta.index()
    }

    pub(crate) fn add_incoming_link(&mut self, link: LinkIndex) {
        self.links_in.push(link);
    }

    pub(crate) fn add_outgoing_link(&mut self, link: LinkIndex) {
        self.links_out.push(link);
    }

    pub fn incoming_links(&self) -> &[LinkIndex] {
        &self.links_in
    }

    pub fn outgoing_links(&self) -> &[LinkIndex] {
        &self.links_out
    }

    /// Computes the virtual downstream density of the node, i.e. the
    /// boundary density seen by the links entering it.
    ///
    /// With a single exiting link and no terminal boundary the first-segment
    /// density passes through unchanged; the merge formula only engages for
    /// two or more candidates.
    pub fn get_downstream_density(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
    ) -> Result<f64, MetanetError> {
        // following the link entering this node, the node can only be a
        // destination or have one or more exiting links
        let destination_density = match network.destination_at(self.index()) {
            Some(destination_index) => network
                .destinations()
                .get(&destination_index)?
                .density_contribution(network, state, engine)?,
            None => None,
        };

        let links_down = network.out_links(self.index())?;
        match (links_down.len(), destination_density) {
            (0, Some(density)) => Ok(density),
            (0, None) => Err(MetanetError::NoDownstreamBoundary {
                node: self.name().to_string(),
            }),
            (1, None) => Ok(state.link(links_down[0].2)?.first_density()),
            (_, destination_density) => {
                let mut rho_firsts = Vec::with_capacity(links_down.len() + 1);
                for (_, _, link_index) in &links_down {
                    rho_firsts.push(state.link(*link_index)?.first_density());
                }
                if let Some(density) = destination_density {
                    rho_firsts.push(density);
                }
                Ok(engine.downstream_density(&engine.vcat(&rho_firsts)))
            }
        }
    }

    /// Computes the virtual upstream speed and flow of the node for the
    /// given exiting link.
    ///
    /// Speed is dictated by the entering links, or by the origin when there
    /// are none. Flow is the link's turn-rate share of the total inflow,
    /// net of any share claimed by an off-ramp destination.
    pub fn get_upstream_speed_and_flow(
        &self,
        network: &Network,
        state: &NetworkState,
        engine: &dyn Engine,
        link_index: LinkIndex,
        config: &SimulationConfig,
    ) -> Result<(f64, f64), MetanetError> {
        let links_up = network.in_links(self.index())?;
        let origin = match network.origin_at(self.index()) {
            Some(origin_index) => Some(network.origins().get(&origin_index)?),
            None => None,
        };
        if links_up.is_empty() && origin.is_none() {
            return Err(MetanetError::NoUpstreamPath {
                node: self.name().to_string(),
            });
        }

        let mut v_up = Vec::with_capacity(links_up.len());
        let mut q_up = Vec::with_capacity(links_up.len());
        for (_, _, entering_index) in &links_up {
            let link = network.links().get(entering_index)?;
            v_up.push(state.link(*entering_index)?.last_speed());
            q_up.push(link.last_flow(state, engine)?);
        }
        let (v_origin, mut q_origin) = match origin {
            Some(origin) => (
                origin.get_speed(network, state)?,
                origin.get_flow(network, state, engine, config)?,
            ),
            None => (0.0, 0.0),
        };

        // with no entering links the origin's flow becomes the upstream flow
        // itself and must not be counted a second time below
        let (speed, total_flow_up) = match links_up.len() {
            0 => {
                let flow = q_origin;
                q_origin = 0.0;
                (v_origin, flow)
            }
            1 => (v_up[0], q_up[0]),
            _ => {
                let flows = engine.vcat(&q_up);
                let speeds = engine.vcat(&v_up);
                let speed = engine.upstream_speed(&flows, &speeds);
                (speed, flows.sum())
            }
        };

        let links_down = network.out_links(self.index())?;
        if !links_down.iter().any(|(_, _, exiting)| *exiting == link_index) {
            return Err(MetanetError::LinkNotExiting {
                link: network.links().get(&link_index)?.name().to_string(),
                node: self.name().to_string(),
            });
        }
        let mut turn_rates = Vec::with_capacity(links_down.len());
        for (_, _, exiting_index) in &links_down {
            turn_rates.push(network.links().get(exiting_index)?.turn_rate());
        }
        let turn_rates = engine.vcat(&turn_rates);

        let q_destination = match network.destination_at(self.index()) {
            Some(destination_index) => {
                match network.destinations().get(&destination_index)?.as_off_ramp() {
                    Some(ramp) => Some(ramp.get_flow(
                        network,
                        state,
                        engine,
                        config,
                        Some(total_flow_up),
                        Some(q_origin),
                        Some(&turn_rates),
                    )?),
                    None => None,
                }
            }
            None => None,
        };

        let turn_rate = network.links().get(&link_index)?.turn_rate();
        let flow = engine.upstream_flow(total_flow_up, turn_rate, &turn_rates, q_origin, q_destination);
        Ok((speed, flow))
    }
}

#[derive(Default)]
pub struct NodeVec {
    nodes: Vec<Node>,
}

impl Deref for NodeVec {
    type Target = Vec<Node>;

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

impl DerefMut for NodeVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.nodes
    }
}

impl NodeVec {
    pub fn get(&self, index: &NodeIndex) -> Result<&Node, MetanetError> {
        self.nodes
            .get(index.0)
            .ok_or(MetanetError::NodeIndexNotFound { index: *index })
    }

    pub fn get_mut(&mut self, index: &NodeIndex) -> Result<&mut Node, MetanetError> {
        self.nodes
            .get_mut(index.0)
            .ok_or(MetanetError::NodeIndexNotFound { index: *index })
    }

    pub fn push_new(&mut self, name: &str) -> NodeIndex {
        let node_index = NodeIndex(self.nodes.len());
        self.nodes.push(Node::new(&node_index, name));
        node_index
    }
}
