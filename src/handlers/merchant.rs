use axum::{extract::{State, Path}, Json, Extension};
use axum::http::StatusCode;
use crate::state::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::dtos::merchant::{
    CreateMerchantRequest, IssueTypeCount, MerchantPerformanceResponse, MerchantResponse,
    MerchantSummary, TransactionResponse, UpdateMerchantRequest,
};
use crate::models::merchant::{MerchantRow, MerchantTransactionRow};
use crate::models::purchase_order::IssueType;
use crate::reconciliation::split::round2;

fn to_response(m: MerchantRow) -> MerchantResponse {
    MerchantResponse {
        id: m.id,
        name: m.name,
        contact_name: m.contact_name,
        email: m.email,
        phone: m.phone,
        address: m.address,
        created_at: m.created_at,
    }
}

pub async fn create_merchant(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMerchantRequest>,
) -> Result<(StatusCode, Json<MerchantResponse>), AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can create merchants"));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Merchant name is required"));
    }

    let merchant = sqlx::query_as::<_, MerchantRow>(
        r#"INSERT INTO merchants (name, contact_name, email, phone, address)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id, name, contact_name, email, phone, address, created_at"#,
    )
    .bind(req.name.trim())
    .bind(req.contact_name)
    .bind(req.email)
    .bind(req.phone)
    .bind(req.address)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        if let Some(db) = e.as_database_error() {
            if db.code().as_deref() == Some("23505") {
                return AppError::conflict("Merchant name already exists");
            }
        }
        AppError::db(e)
    })?;

    Ok((StatusCode::CREATED, Json(to_response(merchant))))
}

pub async fn get_merchant(
    State(AppState { db_pool }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MerchantResponse>, AppError> {
    let merchant = sqlx::query_as::<_, MerchantRow>(
        r#"SELECT id, name, contact_name, email, phone, address, created_at
           FROM merchants WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Merchant not found"))?;

    Ok(Json(to_response(merchant)))
}

pub async fn list_merchants(
    State(AppState { db_pool }): State<AppState>,
) -> Result<Json<Vec<MerchantSummary>>, AppError> {
    let merchants = sqlx::query_as::<_, MerchantRow>(
        r#"SELECT id, name, contact_name, email, phone, address, created_at
           FROM merchants ORDER BY name ASC"#,
    )
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(
        merchants
            .into_iter()
            .map(|m| MerchantSummary {
                id: m.id,
                name: m.name,
                contact_name: m.contact_name,
                phone: m.phone,
            })
            .collect(),
    ))
}

pub async fn update_merchant(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMerchantRequest>,
) -> Result<Json<MerchantResponse>, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can update merchants"));
    }
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Merchant name must not be blank"));
        }
    }

    let merchant = sqlx::query_as::<_, MerchantRow>(
        r#"UPDATE merchants SET
              name = COALESCE($2, name),
              contact_name = COALESCE($3, contact_name),
              email = COALESCE($4, email),
              phone = COALESCE($5, phone),
              address = COALESCE($6, address)
           WHERE id = $1
           RETURNING id, name, contact_name, email, phone, address, created_at"#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.contact_name)
    .bind(req.email)
    .bind(req.phone)
    .bind(req.address)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| {
        if let Some(db) = e.as_database_error() {
            if db.code().as_deref() == Some("23505") {
                return AppError::conflict("Merchant name already exists");
            }
        }
        AppError::db(e)
    })?
    .ok_or_else(|| AppError::not_found("Merchant not found"))?;

    Ok(Json(to_response(merchant)))
}

pub async fn delete_merchant(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can delete merchants"));
    }

    let referenced: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM purchase_order_items WHERE merchant_id = $1)",
    )
    .bind(id)
    .fetch_one(&db_pool)
    .await?;
    if referenced {
        return Err(AppError::conflict("Cannot delete merchant with purchase order lines"));
    }

    let result = sqlx::query("DELETE FROM merchants WHERE id = $1")
        .bind(id)
        .execute(&db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Merchant not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_transactions(
    State(AppState { db_pool }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    ensure_merchant_exists(&db_pool, id).await?;

    let rows = sqlx::query_as::<_, MerchantTransactionRow>(
        r#"SELECT id, merchant_id, purchase_order_id, amount, transaction_type, occurred_at, notes
           FROM merchant_transactions
           WHERE merchant_id = $1
           ORDER BY occurred_at DESC, id DESC"#,
    )
    .bind(id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|t| TransactionResponse {
                id: t.id,
                merchant_id: t.merchant_id,
                purchase_order_id: t.purchase_order_id,
                amount: t.amount,
                transaction_type: t.transaction_type,
                occurred_at: t.occurred_at,
                notes: t.notes,
            })
            .collect(),
    ))
}

pub async fn merchant_performance(
    State(AppState { db_pool }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MerchantPerformanceResponse>, AppError> {
    ensure_merchant_exists(&db_pool, id).await?;

    #[derive(sqlx::FromRow)]
    struct OrderedTotals {
        orders_involved: i64,
        total_ordered: f64,
    }
    let ordered = sqlx::query_as::<_, OrderedTotals>(
        r#"SELECT COUNT(DISTINCT purchase_order_id) AS orders_involved,
              COALESCE(SUM(quantity), 0) AS total_ordered
           FROM purchase_order_items
           WHERE merchant_id = $1"#,
    )
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    let total_received_good: f64 = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(r.good_quantity), 0)
           FROM item_receipts r
           JOIN purchase_order_items poi ON poi.id = r.purchase_order_item_id
           WHERE poi.merchant_id = $1"#,
    )
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    #[derive(sqlx::FromRow)]
    struct IssueTotals {
        total_issue_quantity: f64,
        active_issue_count: i64,
    }
    let issues = sqlx::query_as::<_, IssueTotals>(
        r#"SELECT COALESCE(SUM(s.affected_quantity), 0) AS total_issue_quantity,
              COUNT(*) FILTER (WHERE s.issue_status = 'reported') AS active_issue_count
           FROM issues s
           JOIN item_receipts r ON r.id = s.item_receipt_id
           JOIN purchase_order_items poi ON poi.id = r.purchase_order_item_id
           WHERE poi.merchant_id = $1"#,
    )
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    #[derive(sqlx::FromRow)]
    struct IssueTypeRow {
        issue_type: IssueType,
        count: i64,
        total_quantity: f64,
    }
    let by_type = sqlx::query_as::<_, IssueTypeRow>(
        r#"SELECT s.issue_type, COUNT(*) AS count,
              COALESCE(SUM(s.affected_quantity), 0) AS total_quantity
           FROM issues s
           JOIN item_receipts r ON r.id = s.item_receipt_id
           JOIN purchase_order_items poi ON poi.id = r.purchase_order_item_id
           WHERE poi.merchant_id = $1
           GROUP BY s.issue_type
           ORDER BY s.issue_type"#,
    )
    .bind(id)
    .fetch_all(&db_pool)
    .await?;

    let issue_rate = if ordered.total_ordered > 0.0 {
        round2(issues.total_issue_quantity / ordered.total_ordered)
    } else {
        0.0
    };

    Ok(Json(MerchantPerformanceResponse {
        merchant_id: id,
        orders_involved: ordered.orders_involved,
        total_ordered: ordered.total_ordered,
        total_received_good,
        total_issue_quantity: issues.total_issue_quantity,
        active_issue_count: issues.active_issue_count,
        issue_rate,
        issues_by_type: by_type
            .into_iter()
            .map(|t| IssueTypeCount {
                issue_type: t.issue_type,
                count: t.count,
                total_quantity: t.total_quantity,
            })
            .collect(),
    }))
}

pub(crate) async fn ensure_merchant_exists(db_pool: &sqlx::PgPool, id: i64) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM merchants WHERE id = $1)")
        .bind(id)
        .fetch_one(db_pool)
        .await?;
    if !exists {
        return Err(AppError::not_found("Merchant not found"));
    }
    Ok(())
}
