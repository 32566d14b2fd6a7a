use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::models::purchase_order::{IssueStatus, IssueType, ResolutionType};
use crate::reconciliation::merchant_group::MerchantDisplay;

#[derive(Serialize)]
pub struct IssueResponse {
    pub id: i64,
    pub item_receipt_id: i64,
    pub purchase_order_item_id: i64,
    pub issue_type: IssueType,
    pub affected_quantity: f64,
    pub issue_status: IssueStatus,
    pub report_notes: Option<String>,
    pub resolution_type: Option<ResolutionType>,
    pub resolution_notes: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Issues for one order, grouped by merchant. Merchant-less issues share
/// the "no-merchant" sentinel group.
#[derive(Serialize)]
pub struct MerchantIssueGroup {
    pub merchant_key: String,
    pub merchant_id: Option<i64>,
    pub merchant: MerchantDisplay,
    pub issues: Vec<IssueResponse>,
}

#[derive(Deserialize)]
pub struct ResolveIssueRequest {
    pub issue_id: i64,
    pub resolution_type: ResolutionType,
    pub resolution_notes: String,
}

#[derive(Serialize)]
pub struct ResolveIssuesResponse {
    pub resolved_ids: Vec<i64>,
}
