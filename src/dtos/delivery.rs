use serde::Deserialize;
use crate::reconciliation::split::QuantitySplit;

/// One receiving submission. Each entry addresses an aggregated
/// (item type, merchant) bucket; the server validates the split against
/// that bucket's remaining quantity and distributes it across the
/// underlying order lines.
#[derive(Deserialize)]
pub struct RecordDeliveryRequest {
    pub receipts: Vec<AggregateReceipt>,
    pub delivery_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AggregateReceipt {
    pub item_type_id: i64,
    pub merchant_id: Option<i64>,
    #[serde(flatten)]
    pub split: QuantitySplit,
    pub issue_notes: Option<String>,
    #[serde(default)]
    pub is_redelivery: bool,
}
