use core::fmt;

use serde::{Deserialize, Serialize};

/// A named step of the block lifecycle. Every phase has its own ordering list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitGenesis,
    ExportGenesis,
    PreBlock,
    BeginBlock,
    EndBlock,
    Precommit,
    PrepareCheckState,
    Migrations,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::InitGenesis,
        Phase::ExportGenesis,
        Phase::PreBlock,
        Phase::BeginBlock,
        Phase::EndBlock,
        Phase::Precommit,
        Phase::PrepareCheckState,
        Phase::Migrations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InitGenesis => "init_genesis",
            Phase::ExportGenesis => "export_genesis",
            Phase::PreBlock => "pre_block",
            Phase::BeginBlock => "begin_block",
            Phase::EndBlock => "end_block",
            Phase::Precommit => "precommit",
            Phase::PrepareCheckState => "prepare_check_state",
            Phase::Migrations => "migrations",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
