use crate::destination::DestinationIndex;
use crate::engine::Var;
use crate::link::LinkIndex;
use crate::origin::OriginIndex;
use crate::MetanetError;

/// Densities and speeds of a link, one value per segment.
///
/// Index 0 is the segment nearest the upstream node; the last index is the
/// segment nearest the downstream node.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkState {
    pub density: Var,
    pub speed: Var,
}

impl LinkState {
    pub fn new(density: Var, speed: Var) -> Self {
        Self { density, speed }
    }

    pub fn num_segments(&self) -> usize {
        self.density.len()
    }

    pub fn first_density(&self) -> f64 {
        self.density[0]
    }

    pub fn last_density(&self) -> f64 {
        self.density[self.density.len() - 1]
    }

    pub fn first_speed(&self) -> f64 {
        self.speed[0]
    }

    pub fn last_speed(&self) -> f64 {
        self.speed[self.speed.len() - 1]
    }
}

/// Queue, metering-rate action and demand disturbance of a metered on-ramp.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RampState {
    pub queue: f64,
    pub metering_rate: f64,
    pub demand: f64,
}

/// Queue, desired-flow action and demand disturbance of a simplified ramp.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SimpleRampState {
    pub queue: f64,
    pub desired_flow: f64,
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OriginState {
    Mainstream,
    MeteredRamp(RampState),
    SimpleMeteredRamp(SimpleRampState),
}

impl OriginState {
    pub fn queue(&self) -> Option<f64> {
        match self {
            Self::Mainstream => None,
            Self::MeteredRamp(state) => Some(state.queue),
            Self::SimpleMeteredRamp(state) => Some(state.queue),
        }
    }

    pub fn metered_ramp(&self) -> Option<&RampState> {
        match self {
            Self::MeteredRamp(state) => Some(state),
            _ => None,
        }
    }

    pub fn metered_ramp_mut(&mut self) -> Option<&mut RampState> {
        match self {
            Self::MeteredRamp(state) => Some(state),
            _ => None,
        }
    }

    pub fn simple_metered_ramp(&self) -> Option<&SimpleRampState> {
        match self {
            Self::SimpleMeteredRamp(state) => Some(state),
            _ => None,
        }
    }

    pub fn simple_metered_ramp_mut(&mut self) -> Option<&mut SimpleRampState> {
        match self {
            Self::SimpleMeteredRamp(state) => Some(state),
            _ => None,
        }
    }
}

/// State of a destination; only congestion scenarios carry a value.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DestinationState {
    pub scenario_density: Option<f64>,
}

/// All mutable state of a network, held apart from the topology.
///
/// Junction and destination queries are pure reads of this state; stepping
/// the network produces a fresh `NetworkState` and never mutates the one it
/// was given.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    links: Vec<LinkState>,
    origins: Vec<OriginState>,
    destinations: Vec<DestinationState>,
}

impl NetworkState {
    pub(crate) fn new(
        links: Vec<LinkState>,
        origins: Vec<OriginState>,
        destinations: Vec<DestinationState>,
    ) -> Self {
        Self {
            links,
            origins,
            destinations,
        }
    }

    pub fn link(&self, index: LinkIndex) -> Result<&LinkState, MetanetError> {
        self.links
            .get(*index)
            .ok_or(MetanetError::LinkIndexNotFound { index })
    }

    pub fn link_mut(&mut self, index: LinkIndex) -> Result<&mut LinkState, MetanetError> {
        self.links
            .get_mut(*index)
            .ok_or(MetanetError::LinkIndexNotFound { index })
    }

    pub fn origin(&self, index: OriginIndex) -> Result<&OriginState, MetanetError> {
        self.origins
            .get(*index)
            .ok_or(MetanetError::OriginIndexNotFound { index })
    }

    pub fn origin_mut(&mut self, index: OriginIndex) -> Result<&mut OriginState, MetanetError> {
        self.origins
            .get_mut(*index)
            .ok_or(MetanetError::OriginIndexNotFound { index })
    }

    pub fn destination(&self, index: DestinationIndex) -> Result<&DestinationState, MetanetError> {
        self.destinations
            .get(*index)
            .ok_or(MetanetError::DestinationIndexNotFound { index })
    }

    pub fn destination_mut(
        &mut self,
        index: DestinationIndex,
    ) -> Result<&mut DestinationState, MetanetError> {
        self.destinations
            .get_mut(*index)
            .ok_or(MetanetError::DestinationIndexNotFound { index })
    }

    pub fn destinations(&self) -> &[DestinationState] {
        &self.destinations
    }
}
