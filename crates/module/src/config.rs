use lattice_types::Phase;
use serde::{Deserialize, Serialize};

/// Ordering overrides loaded from the node configuration.
///
/// Every list is optional; unset lists keep whatever order the application wired in code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_genesis: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_genesis: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_blockers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_blockers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_blockers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precommiters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepare_check_staters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_migrations: Option<Vec<String>>,
}

impl RuntimeConfig {
    pub fn order(&self, phase: Phase) -> Option<&[String]> {
        let order = match phase {
            Phase::InitGenesis => &self.init_genesis,
            Phase::ExportGenesis => &self.export_genesis,
            Phase::PreBlock => &self.pre_blockers,
            Phase::BeginBlock => &self.begin_blockers,
            Phase::EndBlock => &self.end_blockers,
            Phase::Precommit => &self.precommiters,
            Phase::PrepareCheckState => &self.prepare_check_staters,
            Phase::Migrations => &self.order_migrations,
        };
        order.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        Phase::ALL.iter().all(|phase| self.order(*phase).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_fields_to_phases() {
        let cfg: RuntimeConfig = serde_json::from_str(
            r#"{"begin_blockers":["mint","staking"],"order_migrations":["auth"]}"#,
        )
        .unwrap();

        assert_eq!(cfg.order(Phase::BeginBlock).unwrap(), ["mint", "staking"]);
        assert_eq!(cfg.order(Phase::Migrations).unwrap(), ["auth"]);
        assert!(cfg.order(Phase::EndBlock).is_none());
        assert!(!cfg.is_empty());
        assert!(RuntimeConfig::default().is_empty());
    }

    #[test]
    fn rejects_unknown_lists() {
        assert!(serde_json::from_str::<RuntimeConfig>(r#"{"begin_blocker":[]}"#).is_err());
    }
}
