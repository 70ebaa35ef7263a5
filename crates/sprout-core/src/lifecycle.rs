use crate::CoreError;
use sprout_store::EnvState;

/// Check a lifecycle state change. Destroy is not a transition and is always allowed.
pub fn validate_transition(from: EnvState, to: EnvState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (EnvState::Resolved, EnvState::Created | EnvState::Failed)
            | (EnvState::Created | EnvState::Started, EnvState::Started)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Whether `onStart` may run in this state.
pub fn can_start(state: EnvState) -> bool {
    matches!(state, EnvState::Created | EnvState::Started)
}
