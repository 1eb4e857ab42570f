//! Per-phase results returned to the consensus engine.

use serde::{Deserialize, Serialize};

use crate::{event::Event, validator::ValidatorUpdate};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChainResponse {
    pub validators: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreBlockResponse {
    /// True when at least one module changed the consensus parameters.
    pub consensus_params_changed: bool,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginBlockResponse {
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndBlockResponse {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}
