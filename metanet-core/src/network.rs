use crate::destination::{Destination, DestinationIndex, DestinationVec};
use crate::engine::{Engine, RampMetering};
use crate::link::{Link, LinkIndex, LinkParameters, LinkVec};
use crate::node::{Node, NodeIndex, NodeVec};
use crate::origin::{Origin, OriginIndex, OriginVec};
use crate::simulation::SimulationConfig;
use crate::state::{DestinationState, LinkState, NetworkState, OriginState, RampState, SimpleRampState};
use crate::MetanetError;
use std::collections::HashMap;
use tracing::debug;

/// Container for the topology of a highway network.
///
/// The topology is built once and is read-only afterwards: junction and
/// destination queries only ever read it, and stepping produces fresh
/// [`NetworkState`]s.
#[derive(Default)]
pub struct Network {
    name: String,
    nodes: NodeVec,
    links: LinkVec,
    origins: OriginVec,
    destinations: DestinationVec,
    origins_by_node: HashMap<NodeIndex, OriginIndex>,
    destinations_by_node: HashMap<NodeIndex, DestinationIndex>,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &NodeVec {
        &self.nodes
    }

    pub fn links(&self) -> &LinkVec {
        &self.links
    }

    pub fn origins(&self) -> &OriginVec {
        &self.origins
    }

    pub fn destinations(&self) -> &DestinationVec {
        &self.destinations
    }

    pub fn add_node(&mut self, name: &str) -> Result<NodeIndex, MetanetError> {
        if self.get_node_index_by_name(name).is_some() {
            return Err(MetanetError::NodeAlreadyExists {
                name: name.to_string(),
            });
        }
        Ok(self.nodes.push_new(name))
    }

    /// Adds a link between two existing nodes and registers it in the
    /// adjacency of both.
    pub fn add_link(
        &mut self,
        name: &str,
        from_node: NodeIndex,
        to_node: NodeIndex,
        parameters: LinkParameters,
    ) -> Result<LinkIndex, MetanetError> {
        if from_node == to_node {
            return Err(MetanetError::NodeConnectToSelf {
                name: self.nodes.get(&from_node)?.name().to_string(),
            });
        }
        if parameters.num_segments == 0 {
            return Err(MetanetError::LinkWithoutSegments {
                name: name.to_string(),
            });
        }
        if self.get_link_index_by_name(name).is_some() {
            return Err(MetanetError::LinkAlreadyExists {
                name: name.to_string(),
            });
        }
        // both endpoints must exist before connecting them
        self.nodes.get(&from_node)?;
        self.nodes.get(&to_node)?;

        let link_index = self.links.push_new(name, from_node, to_node, parameters);
        self.nodes.get_mut(&from_node)?.add_outgoing_link(link_index);
        self.nodes.get_mut(&to_node)?.add_incoming_link(link_index);
        Ok(link_index)
    }

    /// Adds a chain of links along consecutive nodes: `nodes[0] -links[0]->
    /// nodes[1] -links[1]-> ..`, one link per consecutive node pair.
    pub fn add_path(
        &mut self,
        nodes: &[NodeIndex],
        links: Vec<(String, LinkParameters)>,
    ) -> Result<Vec<LinkIndex>, MetanetError> {
        if nodes.len() < 2 || links.len() != nodes.len() - 1 {
            return Err(MetanetError::InvalidPath {
                nodes: nodes.len(),
                links: links.len(),
            });
        }
        nodes
            .windows(2)
            .zip(links)
            .map(|(pair, (name, parameters))| self.add_link(&name, pair[0], pair[1], parameters))
            .collect()
    }

    pub fn add_mainstream_origin(
        &mut self,
        name: &str,
        node: NodeIndex,
    ) -> Result<OriginIndex, MetanetError> {
        self.check_new_origin(name, node)?;
        let origin_index = self.origins.push_new_mainstream(name, node);
        self.origins_by_node.insert(node, origin_index);
        Ok(origin_index)
    }

    pub fn add_metered_ramp(
        &mut self,
        name: &str,
        node: NodeIndex,
        capacity: f64,
        metering: RampMetering,
    ) -> Result<OriginIndex, MetanetError> {
        self.check_new_origin(name, node)?;
        let origin_index = self
            .origins
            .push_new_metered_ramp(name, node, capacity, metering);
        self.origins_by_node.insert(node, origin_index);
        Ok(origin_index)
    }

    pub fn add_simple_metered_ramp(
        &mut self,
        name: &str,
        node: NodeIndex,
        capacity: f64,
    ) -> Result<OriginIndex, MetanetError> {
        self.check_new_origin(name, node)?;
        let origin_index = self.origins.push_new_simple_metered_ramp(name, node, capacity);
        self.origins_by_node.insert(node, origin_index);
        Ok(origin_index)
    }

    pub fn add_free_flow_destination(
        &mut self,
        name: &str,
        node: NodeIndex,
    ) -> Result<DestinationIndex, MetanetError> {
        self.check_new_destination(name, node)?;
        let destination_index = self.destinations.push_new_free_flow(name, node);
        self.destinations_by_node.insert(node, destination_index);
        Ok(destination_index)
    }

    pub fn add_congested_destination(
        &mut self,
        name: &str,
        node: NodeIndex,
        scenario: Option<f64>,
    ) -> Result<DestinationIndex, MetanetError> {
        self.check_new_destination(name, node)?;
        let destination_index = self.destinations.push_new_congested(name, node, scenario);
        self.destinations_by_node.insert(node, destination_index);
        Ok(destination_index)
    }

    pub fn add_off_ramp_destination(
        &mut self,
        name: &str,
        node: NodeIndex,
        turn_rate: f64,
    ) -> Result<DestinationIndex, MetanetError> {
        self.check_new_destination(name, node)?;
        let destination_index = self.destinations.push_new_off_ramp(name, node, turn_rate);
        self.destinations_by_node.insert(node, destination_index);
        Ok(destination_index)
    }

    fn check_new_origin(&self, name: &str, node: NodeIndex) -> Result<(), MetanetError> {
        let node = self.nodes.get(&node)?;
        if self.get_origin_index_by_name(name).is_some() {
            return Err(MetanetError::OriginAlreadyExists {
                name: name.to_string(),
            });
        }
        if self.origins_by_node.contains_key(&node.index()) {
            return Err(MetanetError::OriginNodeOccupied {
                node: node.name().to_string(),
            });
        }
        Ok(())
    }

    fn check_new_destination(&self, name: &str, node: NodeIndex) -> Result<(), MetanetError> {
        let node = self.nodes.get(&node)?;
        if self.get_destination_index_by_name(name).is_some() {
            return Err(MetanetError::DestinationAlreadyExists {
                name: name.to_string(),
            });
        }
        if self.destinations_by_node.contains_key(&node.index()) {
            return Err(MetanetError::DestinationNodeOccupied {
                node: node.name().to_string(),
            });
        }
        Ok(())
    }

    /// Links entering the node, as ordered `(from, to, link)` triples.
    pub fn in_links(
        &self,
        node: NodeIndex,
    ) -> Result<Vec<(NodeIndex, NodeIndex, LinkIndex)>, MetanetError> {
        self.nodes
            .get(&node)?
            .incoming_links()
            .iter()
            .map(|link_index| {
                let link = self.links.get(link_index)?;
                Ok((link.from_node(), link.to_node(), *link_index))
            })
            .collect()
    }

    /// Links exiting the node, as ordered `(from, to, link)` triples.
    pub fn out_links(
        &self,
        node: NodeIndex,
    ) -> Result<Vec<(NodeIndex, NodeIndex, LinkIndex)>, MetanetError> {
        self.nodes
            .get(&node)?
            .outgoing_links()
            .iter()
            .map(|link_index| {
                let link = self.links.get(link_index)?;
                Ok((link.from_node(), link.to_node(), *link_index))
            })
            .collect()
    }

    /// Origin attached to the node, if any. At most one can be.
    pub fn origin_at(&self, node: NodeIndex) -> Option<OriginIndex> {
        self.origins_by_node.get(&node).copied()
    }

    /// Destination attached to the node, if any. At most one can be.
    pub fn destination_at(&self, node: NodeIndex) -> Option<DestinationIndex> {
        self.destinations_by_node.get(&node).copied()
    }

    pub fn get_node_index_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.iter().find(|node| node.name() == name).map(|node| node.index())
    }

    pub fn get_node_by_name(&self, name: &str) -> Result<&Node, MetanetError> {
        self.nodes
            .iter()
            .find(|node| node.name() == name)
            .ok_or_else(|| MetanetError::NodeNotFound {
                name: name.to_string(),
            })
    }

    pub fn get_link_index_by_name(&self, name: &str) -> Option<LinkIndex> {
        self.links.iter().find(|link| link.name() == name).map(|link| link.index())
    }

    pub fn get_link_by_name(&self, name: &str) -> Result<&Link, MetanetError> {
        self.links
            .iter()
            .find(|link| link.name() == name)
            .ok_or_else(|| MetanetError::LinkNotFound {
                name: name.to_string(),
            })
    }

    pub fn get_origin_index_by_name(&self, name: &str) -> Option<OriginIndex> {
        self.origins
            .iter()
            .find(|origin| origin.name() == name)
            .map(|origin| origin.index())
    }

    pub fn get_destination_index_by_name(&self, name: &str) -> Option<DestinationIndex> {
        self.destinations
            .iter()
            .find(|destination| destination.name() == name)
            .map(|destination| destination.index())
    }

    /// Checks the structural invariants of the topology, failing on the
    /// first violation.
    ///
    /// Every node needs an inflow (entering link or origin) and an outflow
    /// (exiting link or destination); origins and destinations never share a
    /// node; only ramps may feed a node with entering links; terminal
    /// destinations forbid exiting links, while off-ramps require at least
    /// one to compete with.
    pub fn validate(&self) -> Result<(), MetanetError> {
        for node in self.nodes.iter() {
            let origin = match self.origin_at(node.index()) {
                Some(origin_index) => Some(self.origins.get(&origin_index)?),
                None => None,
            };
            let destination = match self.destination_at(node.index()) {
                Some(destination_index) => Some(self.destinations.get(&destination_index)?),
                None => None,
            };
            let n_in = node.incoming_links().len();
            let n_out = node.outgoing_links().len();

            if origin.is_some() && destination.is_some() {
                return Err(MetanetError::BothOriginAndDestination {
                    node: node.name().to_string(),
                });
            }
            if n_in == 0 && origin.is_none() {
                return Err(MetanetError::NoUpstreamPath {
                    node: node.name().to_string(),
                });
            }
            if n_out == 0 && destination.is_none() {
                return Err(MetanetError::NoDownstreamBoundary {
                    node: node.name().to_string(),
                });
            }
            if let Some(origin) = origin {
                if !origin.is_ramp() && n_in > 0 {
                    return Err(MetanetError::MainstreamOriginWithEnteringLinks {
                        origin: origin.name().to_string(),
                        node: node.name().to_string(),
                    });
                }
                if n_out != 1 {
                    return Err(MetanetError::OriginExitingLinks {
                        origin: origin.name().to_string(),
                        count: n_out,
                    });
                }
            }
            if let Some(destination) = destination {
                if n_in != 1 {
                    return Err(MetanetError::DestinationEnteringLinks {
                        destination: destination.name().to_string(),
                        count: n_in,
                    });
                }
                if destination.demands_flow() {
                    if n_out == 0 {
                        return Err(MetanetError::OffRampWithoutExits {
                            destination: destination.name().to_string(),
                            node: node.name().to_string(),
                        });
                    }
                } else if n_out > 0 {
                    return Err(MetanetError::TerminalDestinationWithExits {
                        destination: destination.name().to_string(),
                        node: node.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Creates a state with fresh variables for every element of the
    /// network.
    pub fn initial_state(&self, engine: &dyn Engine) -> NetworkState {
        let links = self
            .links
            .iter()
            .map(|link| {
                let n = link.num_segments();
                LinkState::new(
                    engine.var(&format!("rho_{}", link.name()), n),
                    engine.var(&format!("v_{}", link.name()), n),
                )
            })
            .collect();
        let origins = self
            .origins
            .iter()
            .map(|origin| match origin {
                Origin::Mainstream(_) => OriginState::Mainstream,
                Origin::MeteredRamp(_) => OriginState::MeteredRamp(RampState {
                    queue: engine.var(&format!("w_{}", origin.name()), 1)[0],
                    metering_rate: engine.var(&format!("r_{}", origin.name()), 1)[0],
                    demand: engine.var(&format!("d_{}", origin.name()), 1)[0],
                }),
                Origin::SimpleMeteredRamp(_) => OriginState::SimpleMeteredRamp(SimpleRampState {
                    queue: engine.var(&format!("w_{}", origin.name()), 1)[0],
                    desired_flow: engine.var(&format!("q_{}", origin.name()), 1)[0],
                    demand: engine.var(&format!("d_{}", origin.name()), 1)[0],
                }),
            })
            .collect();
        let destinations = self
            .destinations
            .iter()
            .map(|destination| match destination {
                Destination::Congested(congested) => DestinationState {
                    scenario_density: Some(congested.scenario().unwrap_or_else(|| {
                        engine.var(&format!("d_{}", destination.name()), 1)[0]
                    })),
                },
                _ => DestinationState::default(),
            })
            .collect();
        NetworkState::new(links, origins, destinations)
    }

    /// Advances every link and origin by one time step, returning the next
    /// state. The given state is only read.
    pub fn step(
        &self,
        state: &NetworkState,
        engine: &dyn Engine,
        config: &SimulationConfig,
    ) -> Result<NetworkState, MetanetError> {
        debug!("stepping network {}", self.name);
        let mut links = Vec::with_capacity(self.links.len());
        for link in self.links.iter() {
            links.push(link.step(self, state, engine, config)?);
        }
        let mut origins = Vec::with_capacity(self.origins.len());
        for origin in self.origins.iter() {
            origins.push(origin.step(self, state, engine, config)?);
        }
        // destinations have no dynamics of their own
        let destinations = state.destinations().to_vec();
        Ok(NetworkState::new(links, origins, destinations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NumericEngine, VarInit};
    use crate::test_utils::{default_parameters, merge_network, offramp_network, simple_network, uniform_state};
    use float_cmp::assert_approx_eq;
    use std::ops::Deref;

    #[test]
    fn build_a_simple_network() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        assert_eq!(*n1.deref(), 0);
        assert_eq!(*n2.deref(), 1);

        let l1 = network.add_link("L1", n1, n2, default_parameters()).unwrap();
        let o1 = network.add_mainstream_origin("O1", n1).unwrap();
        let d1 = network.add_free_flow_destination("D1", n2).unwrap();

        assert_eq!(network.in_links(n2).unwrap(), vec![(n1, n2, l1)]);
        assert_eq!(network.out_links(n1).unwrap(), vec![(n1, n2, l1)]);
        assert!(network.in_links(n1).unwrap().is_empty());
        assert_eq!(network.origin_at(n1), Some(o1));
        assert_eq!(network.destination_at(n2), Some(d1));
        assert_eq!(network.get_node_index_by_name("N2"), Some(n2));
        assert_eq!(network.get_link_index_by_name("L1"), Some(l1));

        network.validate().unwrap();
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        assert!(matches!(
            network.add_node("N1"),
            Err(MetanetError::NodeAlreadyExists { name }) if name == "N1"
        ));

        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        assert!(matches!(
            network.add_link("L1", n1, n2, default_parameters()),
            Err(MetanetError::LinkAlreadyExists { name }) if name == "L1"
        ));

        network.add_mainstream_origin("O1", n1).unwrap();
        assert!(matches!(
            network.add_metered_ramp("O1", n2, 2000.0, RampMetering::CapacityFraction),
            Err(MetanetError::OriginAlreadyExists { name }) if name == "O1"
        ));
    }

    #[test]
    fn one_origin_and_destination_per_node() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        assert!(matches!(
            network.add_metered_ramp("O2", n1, 2000.0, RampMetering::CapacityFraction),
            Err(MetanetError::OriginNodeOccupied { node }) if node == "N1"
        ));

        network.add_free_flow_destination("D1", n1).unwrap();
        assert!(matches!(
            network.add_congested_destination("D2", n1, None),
            Err(MetanetError::DestinationNodeOccupied { node }) if node == "N1"
        ));
    }

    #[test]
    fn self_loops_are_rejected() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        assert!(matches!(
            network.add_link("L1", n1, n1, default_parameters()),
            Err(MetanetError::NodeConnectToSelf { name }) if name == "N1"
        ));
    }

    #[test]
    fn add_path_builds_the_chain() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        let n3 = network.add_node("N3").unwrap();
        let links = network
            .add_path(
                &[n1, n2, n3],
                vec![
                    ("L1".to_string(), default_parameters()),
                    ("L2".to_string(), default_parameters()),
                ],
            )
            .unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(network.out_links(n1).unwrap()[0].2, links[0]);
        assert_eq!(network.in_links(n3).unwrap()[0].2, links[1]);

        assert!(matches!(
            network.add_path(&[n1], vec![]),
            Err(MetanetError::InvalidPath { nodes: 1, links: 0 })
        ));
    }

    #[test]
    fn validation_requires_an_inflow_and_an_outflow() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();

        assert!(matches!(
            network.validate(),
            Err(MetanetError::NoUpstreamPath { node }) if node == "N1"
        ));

        network.add_mainstream_origin("O1", n1).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::NoDownstreamBoundary { node }) if node == "N2"
        ));

        network.add_free_flow_destination("D1", n2).unwrap();
        network.validate().unwrap();
    }

    #[test]
    fn validation_rejects_origin_and_destination_on_one_node() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_free_flow_destination("D1", n1).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::BothOriginAndDestination { node }) if node == "N1"
        ));
    }

    #[test]
    fn validation_rejects_non_ramp_origins_with_entering_links() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        let n3 = network.add_node("N3").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_link("L2", n2, n3, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_mainstream_origin("O2", n2).unwrap();
        network.add_free_flow_destination("D1", n3).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::MainstreamOriginWithEnteringLinks { origin, node })
                if origin == "O2" && node == "N2"
        ));
    }

    #[test]
    fn validation_rejects_origins_with_multiple_exits() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        let n3 = network.add_node("N3").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_link("L2", n1, n3, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_free_flow_destination("D1", n2).unwrap();
        network.add_free_flow_destination("D2", n3).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::OriginExitingLinks { origin, count: 2 }) if origin == "O1"
        ));
    }

    #[test]
    fn validation_rejects_terminal_destinations_with_exits() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        let n3 = network.add_node("N3").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_link("L2", n2, n3, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_free_flow_destination("D1", n2).unwrap();
        network.add_free_flow_destination("D2", n3).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::TerminalDestinationWithExits { destination, node })
                if destination == "D1" && node == "N2"
        ));
    }

    #[test]
    fn validation_rejects_destinations_with_two_entering_links() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        let n3 = network.add_node("N3").unwrap();
        network.add_link("L1", n1, n3, default_parameters()).unwrap();
        network.add_link("L2", n2, n3, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_mainstream_origin("O2", n2).unwrap();
        network.add_free_flow_destination("D1", n3).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::DestinationEnteringLinks { count: 2, .. })
        ));
    }

    #[test]
    fn validation_rejects_off_ramps_without_competitors() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        network.add_off_ramp_destination("D1", n2, 1.0).unwrap();
        assert!(matches!(
            network.validate(),
            Err(MetanetError::OffRampWithoutExits { destination, node })
                if destination == "D1" && node == "N2"
        ));
    }

    #[test]
    fn off_ramp_with_a_competing_exit_is_valid() {
        offramp_network().validate().unwrap();
        merge_network().validate().unwrap();
    }

    #[test]
    fn initial_state_matches_the_topology() {
        let network = merge_network();
        let engine = NumericEngine::new(VarInit::Fill(7.0));
        let state = network.initial_state(&engine);

        let link = network.get_link_index_by_name("L3").unwrap();
        let expected = network.links().get(&link).unwrap().num_segments();
        assert_eq!(state.link(link).unwrap().num_segments(), expected);
        assert_approx_eq!(f64, state.link(link).unwrap().first_density(), 7.0);

        let ramp = network.get_origin_index_by_name("O3").unwrap();
        let ramp_state = state.origin(ramp).unwrap().metered_ramp().copied().unwrap();
        assert_approx_eq!(f64, ramp_state.queue, 7.0);
        assert_approx_eq!(f64, ramp_state.demand, 7.0);
    }

    #[test]
    fn initial_state_prefers_the_supplied_scenario() {
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        let supplied = network.add_congested_destination("D1", n2, Some(33.0)).unwrap();

        let state = network.initial_state(&NumericEngine::new(VarInit::Fill(5.0)));
        assert_eq!(state.destination(supplied).unwrap().scenario_density, Some(33.0));

        // without a supplied value a fresh variable is created instead
        let mut network = Network::new("net");
        let n1 = network.add_node("N1").unwrap();
        let n2 = network.add_node("N2").unwrap();
        network.add_link("L1", n1, n2, default_parameters()).unwrap();
        network.add_mainstream_origin("O1", n1).unwrap();
        let fresh = network.add_congested_destination("D1", n2, None).unwrap();
        let state = network.initial_state(&NumericEngine::new(VarInit::Fill(5.0)));
        assert_eq!(state.destination(fresh).unwrap().scenario_density, Some(5.0));
    }

    #[test]
    fn step_is_pure_and_deterministic() {
        let network = simple_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        let state = uniform_state(&network, &engine, 20.0, 80.0);

        let before = state.clone();
        let first = network.step(&state, &engine, &config).unwrap();
        let second = network.step(&state, &engine, &config).unwrap();
        assert_eq!(state, before);
        assert_eq!(first, second);
        assert_ne!(first, state);
    }

    #[test]
    fn stepping_a_merge_network_conserves_plausibility() {
        let network = merge_network();
        let engine = NumericEngine::default();
        let config = SimulationConfig::default();
        // keep the merged demand below the exiting link's capacity so the
        // trajectory stays in free flow
        let mut state = uniform_state(&network, &engine, 6.0, 95.0);
        {
            let ramp = network.get_origin_index_by_name("O3").unwrap();
            let ramp_state = state.origin_mut(ramp).unwrap().metered_ramp_mut().unwrap();
            ramp_state.demand = 500.0;
            ramp_state.metering_rate = 1.0;
        }

        for _ in 0..50 {
            state = network.step(&state, &engine, &config).unwrap();
        }
        for link in network.links().iter() {
            let link_state = state.link(link.index()).unwrap();
            for rho in link_state.density.iter() {
                assert!(rho.is_finite() && *rho >= 0.0);
            }
            for v in link_state.speed.iter() {
                assert!(v.is_finite() && *v >= 0.0);
            }
        }
    }
}
