use axum::{extract::{State, Path}, Json, Extension};
use std::collections::HashSet;
use crate::state::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::dtos::issue::{IssueResponse, MerchantIssueGroup, ResolveIssueRequest, ResolveIssuesResponse};
use crate::models::purchase_order::{IssueStatus, IssueType, ResolutionType};
use crate::reconciliation::merchant_group::{group_by_merchant, normalize_merchant};
use crate::reconciliation::resolution::{validate_resolution, ResolutionError};
use super::purchase_order::{load_merchant_displays, refresh_order_status};

pub async fn list_issues(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MerchantIssueGroup>>, AppError> {
    fetch_grouped_issues(&state, id, false).await.map(Json)
}

pub async fn list_active_issues(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MerchantIssueGroup>>, AppError> {
    fetch_grouped_issues(&state, id, true).await.map(Json)
}

#[derive(sqlx::FromRow)]
struct IssueWithLineRow {
    id: i64,
    item_receipt_id: i64,
    purchase_order_item_id: i64,
    merchant_id: Option<i64>,
    issue_type: IssueType,
    affected_quantity: f64,
    issue_status: IssueStatus,
    report_notes: Option<String>,
    resolution_type: Option<ResolutionType>,
    resolution_notes: Option<String>,
    reported_at: chrono::DateTime<chrono::Utc>,
    resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

async fn fetch_grouped_issues(
    state: &AppState,
    order_id: i64,
    only_reported: bool,
) -> Result<Vec<MerchantIssueGroup>, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM purchase_orders WHERE id = $1)")
        .bind(order_id)
        .fetch_one(&state.db_pool)
        .await?;
    if !exists {
        return Err(AppError::not_found("Purchase order not found"));
    }

    let rows = sqlx::query_as::<_, IssueWithLineRow>(
        r#"SELECT s.id, s.item_receipt_id, poi.id AS purchase_order_item_id, poi.merchant_id,
              s.issue_type, s.affected_quantity, s.issue_status, s.report_notes,
              s.resolution_type, s.resolution_notes, s.reported_at, s.resolved_at
           FROM issues s
           JOIN item_receipts r ON r.id = s.item_receipt_id
           JOIN purchase_order_items poi ON poi.id = r.purchase_order_item_id
           WHERE poi.purchase_order_id = $1
             AND ($2 = FALSE OR s.issue_status = 'reported')
           ORDER BY s.id"#,
    )
    .bind(order_id)
    .bind(only_reported)
    .fetch_all(&state.db_pool)
    .await?;

    let merchant_ids: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.merchant_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let mut conn = state.db_pool.acquire().await?;
    let merchants = load_merchant_displays(&mut conn, &merchant_ids).await?;

    let groups = group_by_merchant(rows, |r| r.merchant_id);
    Ok(groups
        .into_iter()
        .map(|(key, rows)| MerchantIssueGroup {
            merchant_key: key.to_string(),
            merchant_id: key.id(),
            merchant: key
                .id()
                .and_then(|id| merchants.get(&id).cloned())
                .unwrap_or_else(|| normalize_merchant(None, None, None, None)),
            issues: rows
                .into_iter()
                .map(|r| IssueResponse {
                    id: r.id,
                    item_receipt_id: r.item_receipt_id,
                    purchase_order_item_id: r.purchase_order_item_id,
                    issue_type: r.issue_type,
                    affected_quantity: r.affected_quantity,
                    issue_status: r.issue_status,
                    report_notes: r.report_notes,
                    resolution_type: r.resolution_type,
                    resolution_notes: r.resolution_notes,
                    reported_at: r.reported_at,
                    resolved_at: r.resolved_at,
                })
                .collect(),
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct IssueForResolutionRow {
    id: i64,
    issue_status: IssueStatus,
    purchase_order_id: i64,
}

/// Batch resolution. Any already-resolved issue rejects the whole batch with
/// a conflict, so the first of two concurrent resolvers wins and the second
/// learns about it instead of double-applying.
pub async fn resolve_issues(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut req): Json<Vec<ResolveIssueRequest>>,
) -> Result<Json<ResolveIssuesResponse>, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can resolve issues"));
    }
    if req.is_empty() {
        return Err(AppError::validation("Resolution batch must not be empty"));
    }
    order_for_locking(&mut req);

    let mut tx = db_pool.begin().await?;
    let mut affected_orders: HashSet<i64> = HashSet::new();
    let mut resolved_ids = Vec::with_capacity(req.len());

    for item in &req {
        let issue = sqlx::query_as::<_, IssueForResolutionRow>(
            r#"SELECT s.id, s.issue_status, poi.purchase_order_id
               FROM issues s
               JOIN item_receipts r ON r.id = s.item_receipt_id
               JOIN purchase_order_items poi ON poi.id = r.purchase_order_item_id
               WHERE s.id = $1
               FOR UPDATE OF s"#,
        )
        .bind(item.issue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Issue {} not found", item.issue_id)))?;

        validate_resolution(issue.issue_status, &item.resolution_notes).map_err(|e| match e {
            ResolutionError::AlreadyResolved => {
                AppError::conflict(format!("Issue {} is already resolved", issue.id))
            }
            ResolutionError::EmptyNotes => {
                AppError::validation(format!("Issue {}: resolution notes are required", issue.id))
            }
        })?;

        sqlx::query(
            r#"UPDATE issues
               SET issue_status = 'resolved',
                   resolution_type = $2,
                   resolution_notes = $3,
                   resolved_by = $4,
                   resolved_at = NOW()
               WHERE id = $1"#,
        )
        .bind(issue.id)
        .bind(item.resolution_type)
        .bind(item.resolution_notes.trim())
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;

        affected_orders.insert(issue.purchase_order_id);
        resolved_ids.push(issue.id);
    }

    for order_id in &affected_orders {
        refresh_order_status(&mut tx, *order_id).await?;
    }

    tx.commit().await?;

    tracing::info!(resolved = resolved_ids.len(), orders = affected_orders.len(), "Issues resolved");
    Ok(Json(ResolveIssuesResponse { resolved_ids }))
}

/// Row locks are taken in ascending issue id so two overlapping batches
/// cannot deadlock on each other's already-locked rows.
fn order_for_locking(batch: &mut [ResolveIssueRequest]) {
    batch.sort_by_key(|r| r.issue_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(issue_id: i64) -> ResolveIssueRequest {
        ResolveIssueRequest {
            issue_id,
            resolution_type: ResolutionType::Refund,
            resolution_notes: "credited".to_string(),
        }
    }

    #[test]
    fn batches_lock_in_ascending_issue_order() {
        let mut batch = vec![request(9), request(2), request(5), request(2)];
        order_for_locking(&mut batch);
        let ids: Vec<i64> = batch.iter().map(|r| r.issue_id).collect();
        assert_eq!(ids, vec![2, 2, 5, 9]);
    }
}
