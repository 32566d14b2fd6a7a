use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,   // Open, still expecting deliveries
    Disputed,  // At least one reported issue outstanding
    Completed, // Fully received, no open issues
}

impl PurchaseOrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "disputed" => Some(Self::Disputed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Damaged,
    NotArrived,
    WrongItem,
    WrongQuantity,
    QualityIssue,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Reported,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resolution_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    Redelivery,
    Refund,
    AcceptShortage,
    ReplacementPo,
}

#[derive(Debug, FromRow)]
pub struct PurchaseOrderRow {
    pub id: i64,
    pub order_number: String,
    pub status: PurchaseOrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub purchase_order_id: i64,
    pub item_type_id: i64,
    pub merchant_id: Option<i64>,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, FromRow)]
pub struct ItemReceiptRow {
    pub id: i64,
    pub purchase_order_item_id: i64,
    pub good_quantity: f64,
    pub delivered_at: DateTime<Utc>,
    pub is_redelivery: bool,
    pub delivery_note: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub item_receipt_id: i64,
    pub issue_type: IssueType,
    pub affected_quantity: f64,
    pub issue_status: IssueStatus,
    pub report_notes: Option<String>,
    pub resolution_type: Option<ResolutionType>,
    pub resolution_notes: Option<String>,
    pub reported_by: Option<i64>,
    pub reported_at: DateTime<Utc>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
}
