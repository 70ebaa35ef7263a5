use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle stage controlling when hooks run.
///
/// The set is closed: `onCreate` runs once per environment instance,
/// `onStart` runs on every start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    OnCreate,
    OnStart,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::OnCreate, Phase::OnStart];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::OnCreate => "onCreate",
            Phase::OnStart => "onStart",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_manifest_spelling() {
        for phase in Phase::ALL {
            assert_eq!(phase.to_string(), phase.as_str());
        }
    }

    #[test]
    fn unknown_or_miscased_phase_is_rejected() {
        assert!(serde_json::from_str::<Phase>("\"onStop\"").is_err());
        assert!(serde_json::from_str::<Phase>("\"oncreate\"").is_err());
        assert!(serde_json::from_str::<Phase>("\"OnStart\"").is_err());
    }

    #[test]
    fn serde_uses_manifest_spelling() {
        assert_eq!(serde_json::to_string(&Phase::OnCreate).unwrap(), "\"onCreate\"");
        let p: Phase = serde_json::from_str("\"onStart\"").unwrap();
        assert_eq!(p, Phase::OnStart);
    }
}
