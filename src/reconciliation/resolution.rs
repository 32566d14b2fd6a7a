use thiserror::Error;
use crate::models::purchase_order::IssueStatus;

#[derive(Debug, Error, PartialEq)]
pub enum ResolutionError {
    #[error("Issue is already resolved")]
    AlreadyResolved,
    #[error("Resolution notes are required")]
    EmptyNotes,
}

/// The one resolution-validation rule, shared by every surface that resolves
/// issues: only reported issues are eligible, and the resolution must carry
/// non-blank notes. The reported -> resolved transition is one-way.
pub fn validate_resolution(status: IssueStatus, notes: &str) -> Result<(), ResolutionError> {
    if status != IssueStatus::Reported {
        return Err(ResolutionError::AlreadyResolved);
    }
    if notes.trim().is_empty() {
        return Err(ResolutionError::EmptyNotes);
    }
    Ok(())
}

pub fn is_eligible(status: IssueStatus) -> bool {
    status == IssueStatus::Reported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_issue_with_notes_is_valid() {
        assert_eq!(validate_resolution(IssueStatus::Reported, "refund agreed"), Ok(()));
    }

    #[test]
    fn resolved_issue_is_rejected() {
        assert_eq!(
            validate_resolution(IssueStatus::Resolved, "again"),
            Err(ResolutionError::AlreadyResolved)
        );
    }

    #[test]
    fn blank_notes_are_rejected() {
        assert_eq!(
            validate_resolution(IssueStatus::Reported, "  \t"),
            Err(ResolutionError::EmptyNotes)
        );
    }

    #[test]
    fn only_reported_issues_are_eligible() {
        assert!(is_eligible(IssueStatus::Reported));
        assert!(!is_eligible(IssueStatus::Resolved));
    }
}
