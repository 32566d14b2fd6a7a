use sqlx::FromRow;
use chrono::{DateTime, Utc};

#[derive(Debug, FromRow)]
pub struct MerchantRow {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct MerchantContactRow {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub role_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct MerchantDocumentRow {
    pub id: i64,
    pub merchant_id: i64,
    pub title: String,
    pub doc_type: String,
    pub file_url: String,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct MerchantTransactionRow {
    pub id: i64,
    pub merchant_id: i64,
    pub purchase_order_id: Option<i64>,
    pub amount: f64,
    pub transaction_type: String,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
}
