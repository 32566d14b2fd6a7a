use serde::{Deserialize, Serialize};
use thiserror::Error;
use super::aggregate::AggregatedLine;
use crate::models::purchase_order::IssueType;

/// Quantities live in a 2-decimal-place domain; two values closer than this
/// are the same quantity.
pub const QTY_EPSILON: f64 = 0.005;

/// A user's proposed breakdown of an aggregate's remaining quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantitySplit {
    pub good: f64,
    pub damaged: f64,
    pub not_arrived: f64,
    pub wrong_item: f64,
    pub other: f64,
}

impl QuantitySplit {
    pub fn total(&self) -> f64 {
        self.good + self.damaged + self.not_arrived + self.wrong_item + self.other
    }

    pub fn has_issues(&self) -> bool {
        self.damaged > 0.0 || self.not_arrived > 0.0 || self.wrong_item > 0.0 || self.other > 0.0
    }

    /// Non-good buckets paired with the issue type they report as.
    pub fn issue_buckets(&self) -> [(IssueType, f64); 4] {
        [
            (IssueType::Damaged, self.damaged),
            (IssueType::NotArrived, self.not_arrived),
            (IssueType::WrongItem, self.wrong_item),
            (IssueType::Other, self.other),
        ]
    }

    fn any_negative(&self) -> bool {
        self.good < 0.0
            || self.damaged < 0.0
            || self.not_arrived < 0.0
            || self.wrong_item < 0.0
            || self.other < 0.0
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("Quantities must be zero or greater")]
    NegativeQuantity,
    #[error("Split total {actual} does not match remaining quantity {expected}")]
    TotalMismatch { expected: f64, actual: f64 },
    #[error("Issue notes are required when reporting issue quantities")]
    MissingNotes,
}

/// A split is accepted only when its total exactly matches the remaining
/// quantity and any reported issues carry a non-blank justification.
pub fn validate_split(
    split: &QuantitySplit,
    remaining: f64,
    issue_notes: Option<&str>,
) -> Result<(), SplitError> {
    if split.any_negative() {
        return Err(SplitError::NegativeQuantity);
    }

    let total = split.total();
    if (total - remaining).abs() > QTY_EPSILON {
        return Err(SplitError::TotalMismatch {
            expected: round2(remaining),
            actual: round2(total),
        });
    }

    if split.has_issues() && issue_notes.map_or(true, |n| n.trim().is_empty()) {
        return Err(SplitError::MissingNotes);
    }

    Ok(())
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// A split distributed onto one original order line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAllocation {
    pub line_item_id: i64,
    pub split: QuantitySplit,
}

impl LineAllocation {
    pub fn is_empty(&self) -> bool {
        self.split.total() < QTY_EPSILON
    }
}

/// Distributes each bucket of the split across the aggregate's original
/// lines in proportion to their ordered quantities, rounding every
/// allocated value to 2 decimal places. Per-line rounding can drift the
/// summed parts away from the bucket total by a cent or two; that drift is
/// accepted rather than redistributed.
pub fn distribute(aggregate: &AggregatedLine, split: &QuantitySplit) -> Vec<LineAllocation> {
    aggregate
        .lines
        .iter()
        .map(|line| {
            let proportion = if aggregate.quantity > 0.0 {
                line.quantity / aggregate.quantity
            } else {
                0.0
            };
            LineAllocation {
                line_item_id: line.id,
                split: QuantitySplit {
                    good: round2(split.good * proportion),
                    damaged: round2(split.damaged * proportion),
                    not_arrived: round2(split.not_arrived * proportion),
                    wrong_item: round2(split.wrong_item * proportion),
                    other: round2(split.other * proportion),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::aggregate::{aggregate_lines, OrderLine};

    fn aggregate_of(quantities: &[(i64, f64)]) -> AggregatedLine {
        let lines = quantities
            .iter()
            .map(|(id, qty)| OrderLine {
                id: *id,
                item_type_id: 1,
                merchant_id: Some(1),
                quantity: *qty,
                unit: "pcs".to_string(),
            })
            .collect::<Vec<_>>();
        aggregate_lines(lines).remove(0)
    }

    #[test]
    fn all_good_split_matching_remaining_needs_no_notes() {
        let split = QuantitySplit { good: 30.0, ..Default::default() };
        assert_eq!(validate_split(&split, 30.0, None), Ok(()));
    }

    #[test]
    fn issue_split_requires_non_blank_notes() {
        let split = QuantitySplit { good: 20.0, damaged: 10.0, ..Default::default() };
        assert_eq!(validate_split(&split, 30.0, None), Err(SplitError::MissingNotes));
        assert_eq!(validate_split(&split, 30.0, Some("   ")), Err(SplitError::MissingNotes));
        assert_eq!(validate_split(&split, 30.0, Some("crushed cartons")), Ok(()));
    }

    #[test]
    fn total_must_match_remaining_exactly() {
        let split = QuantitySplit { good: 29.0, ..Default::default() };
        assert_eq!(
            validate_split(&split, 30.0, None),
            Err(SplitError::TotalMismatch { expected: 30.0, actual: 29.0 })
        );
        // Under remaining is just as invalid as over
        let split = QuantitySplit { good: 31.0, ..Default::default() };
        assert!(validate_split(&split, 30.0, None).is_err());
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let split = QuantitySplit { good: 35.0, damaged: -5.0, ..Default::default() };
        assert_eq!(validate_split(&split, 30.0, Some("x")), Err(SplitError::NegativeQuantity));
    }

    #[test]
    fn exact_proportions_distribute_exactly() {
        let aggregate = aggregate_of(&[(1, 10.0), (2, 20.0)]);
        let split = QuantitySplit { good: 30.0, ..Default::default() };
        let allocations = distribute(&aggregate, &split);
        assert_eq!(allocations[0].split.good, 10.0);
        assert_eq!(allocations[1].split.good, 20.0);
    }

    #[test]
    fn non_terminating_proportions_round_to_cents_within_tolerance() {
        // 10/17 and 7/17 of 10 round to 5.88 and 4.12
        let aggregate = aggregate_of(&[(1, 10.0), (2, 7.0)]);
        let split = QuantitySplit { good: 10.0, ..Default::default() };
        let allocations = distribute(&aggregate, &split);
        assert_eq!(allocations[0].split.good, 5.88);
        assert_eq!(allocations[1].split.good, 4.12);
        let sum: f64 = allocations.iter().map(|a| a.split.good).sum();
        assert!((sum - 10.0).abs() <= 0.01);
    }

    #[test]
    fn issue_buckets_distribute_proportionally_too() {
        let aggregate = aggregate_of(&[(1, 10.0), (2, 10.0)]);
        let split = QuantitySplit { good: 10.0, damaged: 5.0, ..Default::default() };
        let allocations = distribute(&aggregate, &split);
        assert_eq!(allocations[0].split.damaged, 2.5);
        assert_eq!(allocations[1].split.damaged, 2.5);
    }

    #[test]
    fn zero_quantity_aggregate_allocates_nothing() {
        let aggregate = aggregate_of(&[(1, 0.0)]);
        let split = QuantitySplit::default();
        let allocations = distribute(&aggregate, &split);
        assert!(allocations[0].is_empty());
    }
}
