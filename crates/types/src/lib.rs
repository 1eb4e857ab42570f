#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

pub mod constants;
pub mod context;
pub mod event;
pub mod height;
pub mod phase;
pub mod response;
pub mod validator;
pub mod version;

pub use context::{BlockInfo, Context};
pub use event::{Event, EventAttribute, EventError, EventManager};
pub use height::Height;
pub use phase::Phase;
pub use response::{BeginBlockResponse, EndBlockResponse, InitChainResponse, PreBlockResponse};
pub use validator::{PublicKey, ValidatorUpdate};
pub use version::{ConsensusVersion, VersionMap};
