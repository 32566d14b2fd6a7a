use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::models::purchase_order::{IssueStatus, IssueType, PurchaseOrderStatus, ResolutionType};
use crate::reconciliation::merchant_group::MerchantDisplay;

#[derive(Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub order_number: String,
    pub items: Vec<NewOrderItem>,
}

#[derive(Deserialize)]
pub struct NewOrderItem {
    pub item_type_id: i64,
    pub merchant_id: Option<i64>,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Serialize)]
pub struct PurchaseOrderSummary {
    pub id: i64,
    pub order_number: String,
    pub status: PurchaseOrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub item_count: i64,
    pub active_issue_count: i64,
}

/// Full nested view: items -> receipts -> issues, plus the server-computed
/// per-(item type, merchant) reconciliation aggregates.
#[derive(Serialize)]
pub struct PurchaseOrderDetail {
    pub id: i64,
    pub order_number: String,
    pub status: PurchaseOrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemDetail>,
    pub aggregates: Vec<AggregateStatus>,
}

#[derive(Serialize)]
pub struct OrderItemDetail {
    pub id: i64,
    pub item_type_id: i64,
    pub item_type_name: String,
    pub merchant_id: Option<i64>,
    pub merchant: MerchantDisplay,
    pub quantity: f64,
    pub unit: String,
    pub receipts: Vec<ReceiptDetail>,
}

#[derive(Serialize)]
pub struct ReceiptDetail {
    pub id: i64,
    pub good_quantity: f64,
    pub delivered_at: DateTime<Utc>,
    pub is_redelivery: bool,
    pub delivery_note: Option<String>,
    pub issues: Vec<IssueDetail>,
}

#[derive(Serialize)]
pub struct IssueDetail {
    pub id: i64,
    pub issue_type: IssueType,
    pub affected_quantity: f64,
    pub issue_status: IssueStatus,
    pub report_notes: Option<String>,
    pub resolution_type: Option<ResolutionType>,
    pub resolution_notes: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct AggregateStatus {
    pub key: String,
    pub item_type_id: i64,
    pub item_type_name: String,
    pub merchant_id: Option<i64>,
    pub merchant: MerchantDisplay,
    pub unit: String,
    pub ordered: f64,
    pub total_received: f64,
    /// Every flagged quantity, resolved or not.
    pub total_issues: f64,
    /// Receiving view: excludes issues resolved via redelivery.
    pub remaining: f64,
    pub line_item_ids: Vec<i64>,
}
