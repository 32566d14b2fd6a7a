use serde::Serialize;
use super::split::round2;
use crate::models::purchase_order::{IssueStatus, IssueType, ResolutionType};

/// One historical receipt against an aggregated line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptView {
    pub good_quantity: f64,
    pub is_redelivery: bool,
    pub issues: Vec<IssueView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueView {
    pub issue_type: IssueType,
    pub affected_quantity: f64,
    pub issue_status: IssueStatus,
    pub resolution_type: Option<ResolutionType>,
}

impl IssueView {
    fn counts_toward(&self, policy: IssuePolicy) -> bool {
        match policy {
            IssuePolicy::CountAll => true,
            IssuePolicy::ExcludeResolvedRedeliveries => !(self.issue_status
                == IssueStatus::Resolved
                && self.resolution_type == Some(ResolutionType::Redelivery)),
        }
    }
}

/// How issue quantities count against the ordered total.
///
/// `CountAll` is the reporting view: every flagged quantity counts,
/// resolved or not. `ExcludeResolvedRedeliveries` is the receiving view:
/// an issue resolved via redelivery releases its quantity back into
/// `remaining`, so the resent goods can be received again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuePolicy {
    CountAll,
    ExcludeResolvedRedeliveries,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reconciled {
    pub ordered: f64,
    pub total_received: f64,
    pub total_issues: f64,
    pub remaining: f64,
}

impl Reconciled {
    pub fn is_fully_received(&self) -> bool {
        self.remaining <= super::split::QTY_EPSILON
    }
}

/// remaining = max(0, ordered - received - issues), clamped at zero.
/// An empty history reconciles to remaining = ordered.
pub fn reconcile(ordered: f64, receipts: &[ReceiptView], policy: IssuePolicy) -> Reconciled {
    let total_received: f64 = receipts.iter().map(|r| r.good_quantity).sum();
    let total_issues: f64 = receipts
        .iter()
        .flat_map(|r| r.issues.iter())
        .filter(|i| i.counts_toward(policy))
        .map(|i| i.affected_quantity)
        .sum();

    Reconciled {
        ordered,
        total_received: round2(total_received),
        total_issues: round2(total_issues),
        remaining: round2((ordered - total_received - total_issues).max(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(good: f64, issues: Vec<IssueView>) -> ReceiptView {
        ReceiptView {
            good_quantity: good,
            is_redelivery: false,
            issues,
        }
    }

    fn issue(qty: f64) -> IssueView {
        IssueView {
            issue_type: IssueType::Damaged,
            affected_quantity: qty,
            issue_status: IssueStatus::Reported,
            resolution_type: None,
        }
    }

    #[test]
    fn remaining_is_ordered_minus_received_minus_issues() {
        let receipts = vec![receipt(40.0, vec![issue(10.0)]), receipt(20.0, vec![])];
        let r = reconcile(100.0, &receipts, IssuePolicy::CountAll);
        assert_eq!(r.total_received, 60.0);
        assert_eq!(r.total_issues, 10.0);
        assert_eq!(r.remaining, 30.0);
    }

    #[test]
    fn remaining_clamps_at_zero_on_over_receipt() {
        let receipts = vec![receipt(60.0, vec![])];
        let r = reconcile(50.0, &receipts, IssuePolicy::CountAll);
        assert_eq!(r.remaining, 0.0);
        assert!(r.is_fully_received());
    }

    #[test]
    fn empty_history_reconciles_to_full_ordered() {
        let r = reconcile(25.0, &[], IssuePolicy::CountAll);
        assert_eq!(r.total_received, 0.0);
        assert_eq!(r.total_issues, 0.0);
        assert_eq!(r.remaining, 25.0);
    }

    #[test]
    fn resolved_redelivery_released_only_under_receiving_policy() {
        let resolved_redelivery = IssueView {
            issue_type: IssueType::NotArrived,
            affected_quantity: 15.0,
            issue_status: IssueStatus::Resolved,
            resolution_type: Some(ResolutionType::Redelivery),
        };
        let receipts = vec![receipt(80.0, vec![resolved_redelivery])];

        let reporting = reconcile(100.0, &receipts, IssuePolicy::CountAll);
        assert_eq!(reporting.total_issues, 15.0);
        assert_eq!(reporting.remaining, 5.0);

        let receiving = reconcile(100.0, &receipts, IssuePolicy::ExcludeResolvedRedeliveries);
        assert_eq!(receiving.total_issues, 0.0);
        assert_eq!(receiving.remaining, 20.0);
    }

    #[test]
    fn resolved_refund_still_counts_under_receiving_policy() {
        let refunded = IssueView {
            issue_type: IssueType::Damaged,
            affected_quantity: 5.0,
            issue_status: IssueStatus::Resolved,
            resolution_type: Some(ResolutionType::Refund),
        };
        let receipts = vec![receipt(0.0, vec![refunded])];
        let r = reconcile(10.0, &receipts, IssuePolicy::ExcludeResolvedRedeliveries);
        assert_eq!(r.total_issues, 5.0);
        assert_eq!(r.remaining, 5.0);
    }
}
