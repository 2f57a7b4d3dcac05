use crate::error::IllegalTransition;
use crate::job::JobStatus;

/// Validates a job status change.
///
/// RUNNING ends in COMPLETED or FAILED; only COMPLETED jobs can be rolled
/// back; FAILED and ROLLED_BACK are terminal.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: JobStatus) -> &'static [JobStatus] {
    use JobStatus::*;
    match from {
        Running => &[Completed, Failed],
        Completed => &[RolledBack],
        Failed => &[],
        RolledBack => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    #[test]
    fn running_transitions() {
        assert!(validate_transition(Running, Completed).is_ok());
        assert!(validate_transition(Running, Failed).is_ok());

        assert!(validate_transition(Running, RolledBack).is_err());
        assert!(validate_transition(Running, Running).is_err());
    }

    #[test]
    fn only_completed_can_roll_back() {
        assert!(validate_transition(Completed, RolledBack).is_ok());
        assert!(validate_transition(Failed, RolledBack).is_err());
        assert!(validate_transition(RolledBack, RolledBack).is_err());
    }
}
