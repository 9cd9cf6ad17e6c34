use anyhow::{Context, Result};
use metanet_core::engine::RampMetering;
use metanet_core::link::LinkParameters;
use metanet_core::network::Network;
use metanet_core::node::NodeIndex;
use metanet_core::simulation::SimulationConfig;
use serde::Deserialize;

/// A complete simulation scenario: topology, model constants and uniform
/// initial conditions.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub config: SimulationConfig,
    pub steps: usize,
    pub nodes: Vec<String>,
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub origins: Vec<OriginSpec>,
    #[serde(default)]
    pub destinations: Vec<DestinationSpec>,
    #[serde(default)]
    pub initial: InitialSpec,
}

#[derive(Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub parameters: LinkParameters,
}

#[derive(Deserialize)]
pub struct OriginSpec {
    pub name: String,
    pub node: String,
    #[serde(flatten)]
    pub kind: OriginKind,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OriginKind {
    Mainstream,
    MeteredRamp { capacity: f64, metering: RampMetering },
    SimpleMeteredRamp { capacity: f64 },
}

#[derive(Deserialize)]
pub struct DestinationSpec {
    pub name: String,
    pub node: String,
    #[serde(flatten)]
    pub kind: DestinationKind,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DestinationKind {
    FreeFlow,
    Congested {
        #[serde(default)]
        scenario: Option<f64>,
    },
    OffRamp {
        #[serde(default = "default_turn_rate")]
        turn_rate: f64,
    },
}

fn default_turn_rate() -> f64 {
    1.0
}

/// Uniform initial conditions applied to every link.
#[derive(Deserialize)]
#[serde(default)]
pub struct InitialSpec {
    pub density: f64,
    pub speed: f64,
}

impl Default for InitialSpec {
    fn default() -> Self {
        Self {
            density: 10.0,
            speed: 90.0,
        }
    }
}

impl Scenario {
    pub fn build_network(&self) -> Result<Network> {
        let mut network = Network::new(&self.name);
        for name in &self.nodes {
            network.add_node(name)?;
        }
        for link in &self.links {
            let from = node_index(&network, &link.from, &link.name)?;
            let to = node_index(&network, &link.to, &link.name)?;
            network.add_link(&link.name, from, to, link.parameters.clone())?;
        }
        for origin in &self.origins {
            let node = node_index(&network, &origin.node, &origin.name)?;
            match origin.kind {
                OriginKind::Mainstream => network.add_mainstream_origin(&origin.name, node)?,
                OriginKind::MeteredRamp { capacity, metering } => {
                    network.add_metered_ramp(&origin.name, node, capacity, metering)?
                }
                OriginKind::SimpleMeteredRamp { capacity } => {
                    network.add_simple_metered_ramp(&origin.name, node, capacity)?
                }
            };
        }
        for destination in &self.destinations {
            let node = node_index(&network, &destination.node, &destination.name)?;
            match destination.kind {
                DestinationKind::FreeFlow => {
                    network.add_free_flow_destination(&destination.name, node)?
                }
                DestinationKind::Congested { scenario } => {
                    network.add_congested_destination(&destination.name, node, scenario)?
                }
                DestinationKind::OffRamp { turn_rate } => {
                    network.add_off_ramp_destination(&destination.name, node, turn_rate)?
                }
            };
        }
        network.validate().context("invalid network topology")?;
        Ok(network)
    }
}

fn node_index(network: &Network, node: &str, element: &str) -> Result<NodeIndex> {
    network
        .get_node_index_by_name(node)
        .with_context(|| format!("unknown node `{node}` referenced by `{element}`"))
}
