//! Macroscopic highway traffic modelling with the METANET framework.
//!
//! A highway is a directed graph of [`node::Node`]s connected by
//! [`link::Link`]s, fed by [`origin::Origin`]s and drained by
//! [`destination::Destination`]s. Junctions carry no physical state of their
//! own; every boundary quantity they report is derived on demand from the
//! neighbouring elements through a computation [`engine::Engine`].

use crate::destination::DestinationIndex;
use crate::link::LinkIndex;
use crate::node::NodeIndex;
use crate::origin::OriginIndex;
use thiserror::Error;

pub mod destination;
pub mod engine;
pub mod link;
pub mod network;
pub mod node;
pub mod origin;
pub mod simulation;
pub mod state;
pub mod test_utils;

#[derive(Error, Debug)]
pub enum MetanetError {
    #[error("node index `{index}` not found")]
    NodeIndexNotFound { index: NodeIndex },
    #[error("link index `{index}` not found")]
    LinkIndexNotFound { index: LinkIndex },
    #[error("origin index `{index}` not found")]
    OriginIndexNotFound { index: OriginIndex },
    #[error("destination index `{index}` not found")]
    DestinationIndexNotFound { index: DestinationIndex },
    #[error("node with name `{name}` not found")]
    NodeNotFound { name: String },
    #[error("link with name `{name}` not found")]
    LinkNotFound { name: String },
    #[error("node with name `{name}` already exists")]
    NodeAlreadyExists { name: String },
    #[error("link with name `{name}` already exists")]
    LinkAlreadyExists { name: String },
    #[error("origin with name `{name}` already exists")]
    OriginAlreadyExists { name: String },
    #[error("destination with name `{name}` already exists")]
    DestinationAlreadyExists { name: String },
    #[error("cannot connect node `{name}` to itself")]
    NodeConnectToSelf { name: String },
    #[error("link `{name}` must have at least one segment")]
    LinkWithoutSegments { name: String },
    #[error("node `{node}` already has an origin attached")]
    OriginNodeOccupied { node: String },
    #[error("node `{node}` already has a destination attached")]
    DestinationNodeOccupied { node: String },
    #[error("cannot build a path from {nodes} nodes and {links} links")]
    InvalidPath { nodes: usize, links: usize },
    #[error("node `{node}` has neither entering links nor an origin")]
    NoUpstreamPath { node: String },
    #[error("node `{node}` has neither exiting links nor a terminal downstream density")]
    NoDownstreamBoundary { node: String },
    #[error("link `{link}` does not exit node `{node}`")]
    LinkNotExiting { link: String, node: String },
    #[error("node `{node}` must either have an origin or a destination, but not both")]
    BothOriginAndDestination { node: String },
    #[error("origin `{origin}` must have exactly one exiting link, found {count}")]
    OriginExitingLinks { origin: String, count: usize },
    #[error("destination `{destination}` must have exactly one entering link, found {count}")]
    DestinationEnteringLinks { destination: String, count: usize },
    #[error("node `{node}` has entering links, but origin `{origin}` is not a ramp")]
    MainstreamOriginWithEnteringLinks { origin: String, node: String },
    #[error("node `{node}` has exiting links, but destination `{destination}` is a terminal boundary")]
    TerminalDestinationWithExits { destination: String, node: String },
    #[error("off-ramp `{destination}` at node `{node}` has no exiting links to compete with")]
    OffRampWithoutExits { destination: String, node: String },
    #[error("destination `{destination}` cannot demand a flow share")]
    DestinationCannotDemandFlow { destination: String },
    #[error("off-ramp `{destination}` does not induce a terminal downstream density")]
    OffRampHasNoDensity { destination: String },
    #[error("state does not match the kind of element `{element}`")]
    StateMismatch { element: String },
}
