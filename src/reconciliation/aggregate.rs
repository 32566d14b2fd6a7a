use std::collections::BTreeMap;
use super::merchant_group::MerchantKey;
use crate::models::purchase_order::OrderItemRow;

/// One purchase-order line as the aggregator sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub id: i64,
    pub item_type_id: i64,
    pub merchant_id: Option<i64>,
    pub quantity: f64,
    pub unit: String,
}

impl From<&OrderItemRow> for OrderLine {
    fn from(row: &OrderItemRow) -> Self {
        OrderLine {
            id: row.id,
            item_type_id: row.item_type_id,
            merchant_id: row.merchant_id,
            quantity: row.quantity,
            unit: row.unit.clone(),
        }
    }
}

/// A synthetic bucket combining all lines that share an item type and
/// merchant. Original lines are retained for proportional distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedLine {
    pub item_type_id: i64,
    pub merchant_key: MerchantKey,
    pub quantity: f64,
    pub unit: String,
    pub lines: Vec<OrderLine>,
}

impl AggregatedLine {
    pub fn key(&self) -> String {
        format!("{}-{}", self.item_type_id, self.merchant_key)
    }

    pub fn merchant_id(&self) -> Option<i64> {
        self.merchant_key.id()
    }

    pub fn line_ids(&self) -> Vec<i64> {
        self.lines.iter().map(|l| l.id).collect()
    }
}

/// Groups lines into per-(item type, merchant) buckets, summing ordered
/// quantities across duplicates. Output order is deterministic: ascending
/// item type, merchant-less buckets last within an item type.
///
/// The bucket's unit comes from its first line; order creation rejects
/// mixed-unit buckets via `unit_conflict`, so merged lines agree by then.
pub fn aggregate_lines(lines: impl IntoIterator<Item = OrderLine>) -> Vec<AggregatedLine> {
    let mut buckets: BTreeMap<(i64, MerchantKey), AggregatedLine> = BTreeMap::new();

    for line in lines {
        let merchant_key = MerchantKey::from_id(line.merchant_id);
        let bucket = buckets
            .entry((line.item_type_id, merchant_key))
            .or_insert_with(|| AggregatedLine {
                item_type_id: line.item_type_id,
                merchant_key,
                quantity: 0.0,
                unit: line.unit.clone(),
                lines: Vec::new(),
            });
        bucket.quantity += line.quantity;
        bucket.lines.push(line);
    }

    buckets.into_values().collect()
}

/// First (item type, merchant) bucket whose lines disagree on unit, if any.
/// Quantities summed across different units are meaningless, so these are
/// rejected when the lines are created.
pub fn unit_conflict<'a>(
    lines: impl IntoIterator<Item = (i64, Option<i64>, &'a str)>,
) -> Option<(i64, MerchantKey)> {
    let mut units: BTreeMap<(i64, MerchantKey), &str> = BTreeMap::new();
    for (item_type_id, merchant_id, unit) in lines {
        let key = (item_type_id, MerchantKey::from_id(merchant_id));
        match units.get(&key) {
            None => {
                units.insert(key, unit);
            }
            Some(seen) if *seen != unit => return Some(key),
            Some(_) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, item_type_id: i64, merchant_id: Option<i64>, quantity: f64) -> OrderLine {
        OrderLine {
            id,
            item_type_id,
            merchant_id,
            quantity,
            unit: "pcs".to_string(),
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate_lines(Vec::new()).is_empty());
    }

    #[test]
    fn sums_quantities_and_retains_originals_per_key() {
        let aggregated = aggregate_lines(vec![
            line(1, 10, Some(7), 4.0),
            line(2, 10, Some(7), 6.5),
            line(3, 10, Some(7), 2.0),
        ]);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].quantity, 12.5);
        assert_eq!(aggregated[0].lines.len(), 3);
        assert_eq!(aggregated[0].key(), "10-7");
    }

    #[test]
    fn distinct_item_type_or_merchant_stays_separate() {
        let aggregated = aggregate_lines(vec![
            line(1, 10, Some(7), 4.0),
            line(2, 10, Some(8), 5.0),
            line(3, 11, Some(7), 6.0),
        ]);
        assert_eq!(aggregated.len(), 3);
        let keys: Vec<String> = aggregated.iter().map(|a| a.key()).collect();
        assert_eq!(keys, vec!["10-7", "10-8", "11-7"]);
    }

    #[test]
    fn merchantless_lines_bucket_under_sentinel() {
        let aggregated = aggregate_lines(vec![
            line(1, 10, None, 4.0),
            line(2, 10, None, 5.0),
            line(3, 10, Some(2), 1.0),
        ]);
        assert_eq!(aggregated.len(), 2);
        let sentinel = aggregated
            .iter()
            .find(|a| a.merchant_key == MerchantKey::Missing)
            .unwrap();
        assert_eq!(sentinel.quantity, 9.0);
        assert_eq!(sentinel.lines.len(), 2);
        assert_eq!(sentinel.key(), "10-no-merchant");
    }

    #[test]
    fn mixed_units_within_a_bucket_are_a_conflict() {
        let conflict = unit_conflict(vec![
            (10, Some(7), "pcs"),
            (10, Some(7), "kg"),
        ]);
        assert_eq!(conflict, Some((10, MerchantKey::Id(7))));
    }

    #[test]
    fn same_unit_per_bucket_is_not_a_conflict() {
        let conflict = unit_conflict(vec![
            (10, Some(7), "pcs"),
            (10, Some(7), "pcs"),
            (10, Some(8), "kg"),
            (10, None, "boxes"),
        ]);
        assert_eq!(conflict, None);
    }
}
