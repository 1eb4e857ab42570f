use lattice_types::{Phase, ValidatorUpdate};

use crate::error::ManagerError;

/// Collects validator updates for a phase, allowing at most one producing module.
///
/// Modules returning an empty list do not count as producers.
#[derive(Debug)]
pub(crate) struct ValidatorUpdateCollector {
    phase: Phase,
    producer: Option<String>,
    updates: Vec<ValidatorUpdate>,
}

impl ValidatorUpdateCollector {
    pub(crate) fn new(phase: Phase) -> Self {
        Self { phase, producer: None, updates: Vec::new() }
    }

    pub(crate) fn add(
        &mut self,
        module: &str,
        updates: Vec<ValidatorUpdate>,
    ) -> Result<(), ManagerError> {
        if updates.is_empty() {
            return Ok(());
        }

        if let Some(first) = &self.producer {
            return Err(ManagerError::MultipleValidatorUpdaters {
                phase: self.phase,
                first: first.clone(),
                second: module.to_string(),
            });
        }

        self.producer = Some(module.to_string());
        self.updates = updates;
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<ValidatorUpdate> {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use lattice_types::PublicKey;

    use super::*;

    fn update(power: i64) -> Vec<ValidatorUpdate> {
        vec![ValidatorUpdate::new(PublicKey::ed25519(vec![1u8; 32]), power)]
    }

    #[test]
    fn empty_lists_do_not_claim_the_validator_set() {
        let mut collector = ValidatorUpdateCollector::new(Phase::EndBlock);
        collector.add("bank", Vec::new()).unwrap();
        collector.add("staking", update(10)).unwrap();
        collector.add("gov", Vec::new()).unwrap();
        assert_eq!(collector.finish(), update(10));
    }

    #[test]
    fn second_producer_is_rejected() {
        let mut collector = ValidatorUpdateCollector::new(Phase::InitGenesis);
        collector.add("staking", update(10)).unwrap();

        let err = collector.add("poa", update(5)).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::MultipleValidatorUpdaters { phase: Phase::InitGenesis, first, second }
                if first == "staking" && second == "poa"
        ));
    }
}
