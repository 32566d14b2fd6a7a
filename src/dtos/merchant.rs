use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::models::purchase_order::IssueType;

#[derive(Deserialize)]
pub struct CreateMerchantRequest {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateMerchantRequest {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct MerchantResponse {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct MerchantSummary {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub role_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Deserialize)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub role_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_primary: Option<bool>,
}

#[derive(Serialize)]
pub struct ContactResponse {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub role_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub doc_type: String,
    pub file_url: String,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: i64,
    pub merchant_id: i64,
    pub title: String,
    pub doc_type: String,
    pub file_url: String,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub merchant_id: i64,
    pub purchase_order_id: Option<i64>,
    pub amount: f64,
    pub transaction_type: String,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct MerchantPerformanceResponse {
    pub merchant_id: i64,
    pub orders_involved: i64,
    pub total_ordered: f64,
    pub total_received_good: f64,
    pub total_issue_quantity: f64,
    pub active_issue_count: i64,
    /// total_issue_quantity / total_ordered, 0 when nothing ordered
    pub issue_rate: f64,
    pub issues_by_type: Vec<IssueTypeCount>,
}

#[derive(Serialize)]
pub struct IssueTypeCount {
    pub issue_type: IssueType,
    pub count: i64,
    pub total_quantity: f64,
}
