//! The context handed to module hooks.
//!
//! A [`Context`] carries the block header information supplied by the consensus engine, the
//! engine's cancellation signal, and the event manager of the phase that is currently running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{event::EventManager, height::Height};

/// Header information for the block being processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: Height,
    pub time: DateTime<Utc>,
    pub chain_id: String,
}

impl BlockInfo {
    pub fn new(height: Height, time: DateTime<Utc>, chain_id: impl Into<String>) -> Self {
        Self { height, time, chain_id: chain_id.into() }
    }
}

#[derive(Clone, Debug)]
pub struct Context {
    info: BlockInfo,
    cancel: CancellationToken,
    events: EventManager,
}

impl Context {
    pub fn new(info: BlockInfo, cancel: CancellationToken) -> Self {
        Self { info, cancel, events: EventManager::new() }
    }

    /// Context for a block that can never be cancelled. Mostly useful in tests and tooling.
    pub fn detached(info: BlockInfo) -> Self {
        Self::new(info, CancellationToken::new())
    }

    /// Same block info and cancellation signal, fresh event manager.
    pub fn branch(&self) -> Self {
        Self { info: self.info.clone(), cancel: self.cancel.clone(), events: EventManager::new() }
    }

    pub fn block_info(&self) -> &BlockInfo {
        &self.info
    }

    pub fn height(&self) -> Height {
        self.info.height
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.info.time
    }

    pub fn chain_id(&self) -> &str {
        &self.info.chain_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn event_manager(&self) -> &EventManager {
        &self.events
    }

    pub fn event_manager_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn into_events(self) -> Vec<crate::event::Event> {
        self.events.into_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn info() -> BlockInfo {
        BlockInfo::new(Height::new(5), DateTime::<Utc>::UNIX_EPOCH, "lattice-test")
    }

    #[test]
    fn branch_shares_cancellation_but_not_events() {
        let token = CancellationToken::new();
        let mut parent = Context::new(info(), token.clone());
        parent.event_manager_mut().emit(Event::new("parent"));

        let child = parent.branch();
        assert!(child.event_manager().is_empty());
        assert_eq!(child.height(), Height::new(5));
        assert_eq!(child.chain_id(), "lattice-test");

        token.cancel();
        assert!(child.is_cancelled());
        assert!(parent.is_cancelled());
    }
}
