use axum::{extract::{State, Path}, Json, Extension};
use axum::http::StatusCode;
use std::collections::HashSet;
use crate::state::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::dtos::delivery::{AggregateReceipt, RecordDeliveryRequest};
use crate::dtos::purchase_order::PurchaseOrderDetail;
use crate::models::purchase_order::PurchaseOrderStatus;
use crate::reconciliation::merchant_group::MerchantKey;
use crate::reconciliation::reconcile::IssuePolicy;
use crate::reconciliation::split::{distribute, validate_split};
use super::purchase_order::{fetch_order_detail, load_snapshot, refresh_order_status};

/// Receiving submission against one purchase order. Each submitted receipt
/// addresses an aggregated (item type, merchant) bucket; its split must
/// reconcile exactly to that bucket's remaining quantity before anything is
/// written. Validation and inserts share one transaction with the history
/// read, so concurrent submissions against the same remaining serialize on
/// the order row and the loser fails validation on re-read.
pub async fn record_delivery(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<RecordDeliveryRequest>,
) -> Result<(StatusCode, Json<PurchaseOrderDetail>), AppError> {
    if !auth.can_record_deliveries() {
        return Err(AppError::forbidden("Only managers and clerks can record deliveries"));
    }
    if req.receipts.is_empty() {
        return Err(AppError::validation("Delivery must contain at least one receipt"));
    }
    if let Some((item_type_id, merchant)) = duplicate_key(&req.receipts) {
        return Err(AppError::validation(format!(
            "Multiple receipts for item type {item_type_id} and merchant {merchant}; submit one split per aggregate"
        )));
    }

    let mut tx = db_pool.begin().await?;

    let snapshot = load_snapshot(&mut tx, id, true).await?;
    if snapshot.order.status == PurchaseOrderStatus::Completed {
        return Err(AppError::conflict("Purchase order is already completed"));
    }

    let aggregates = snapshot.aggregates();
    let history = snapshot.history_by_line();

    for submitted in &req.receipts {
        let key = MerchantKey::from_id(submitted.merchant_id);
        let aggregate = aggregates
            .iter()
            .find(|a| a.item_type_id == submitted.item_type_id && a.merchant_key == key)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Order has no lines for item type {} and merchant {}",
                    submitted.item_type_id, key
                ))
            })?;

        let reconciled =
            snapshot.reconciled(aggregate, &history, IssuePolicy::ExcludeResolvedRedeliveries);
        validate_split(
            &submitted.split,
            reconciled.remaining,
            submitted.issue_notes.as_deref(),
        )
        .map_err(|e| AppError::validation(format!("Receipt for {}: {}", aggregate.key(), e)))?;

        for allocation in distribute(aggregate, &submitted.split) {
            if allocation.is_empty() {
                continue;
            }

            let receipt_id: i64 = sqlx::query_scalar(
                r#"INSERT INTO item_receipts (purchase_order_item_id, good_quantity, is_redelivery, delivery_note)
                   VALUES ($1, $2, $3, $4)
                   RETURNING id"#,
            )
            .bind(allocation.line_item_id)
            .bind(allocation.split.good)
            .bind(submitted.is_redelivery)
            .bind(req.delivery_notes.as_deref())
            .fetch_one(&mut *tx)
            .await?;

            for (issue_type, quantity) in allocation.split.issue_buckets() {
                if quantity <= 0.0 {
                    continue;
                }
                sqlx::query(
                    r#"INSERT INTO issues (item_receipt_id, issue_type, affected_quantity, report_notes, reported_by)
                       VALUES ($1, $2, $3, $4, $5)"#,
                )
                .bind(receipt_id)
                .bind(issue_type)
                .bind(quantity)
                .bind(submitted.issue_notes.as_deref())
                .bind(auth.user_id)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    let status = refresh_order_status(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(order_id = id, status = ?status, receipts = req.receipts.len(), "Delivery recorded");

    let mut conn = db_pool.acquire().await?;
    let detail = fetch_order_detail(&mut conn, id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Every split in a request validates against the same pre-insert remaining,
/// so two receipts addressing one aggregate would both pass and over-receive.
/// One split per (item type, merchant) bucket per request.
fn duplicate_key(receipts: &[AggregateReceipt]) -> Option<(i64, MerchantKey)> {
    let mut seen: HashSet<(i64, MerchantKey)> = HashSet::new();
    receipts.iter().find_map(|r| {
        let key = (r.item_type_id, MerchantKey::from_id(r.merchant_id));
        (!seen.insert(key)).then_some(key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::split::QuantitySplit;

    fn receipt(item_type_id: i64, merchant_id: Option<i64>) -> AggregateReceipt {
        AggregateReceipt {
            item_type_id,
            merchant_id,
            split: QuantitySplit { good: 30.0, ..Default::default() },
            issue_notes: None,
            is_redelivery: false,
        }
    }

    #[test]
    fn repeated_aggregate_bucket_is_flagged() {
        let receipts = vec![receipt(1, Some(1)), receipt(1, Some(1))];
        assert_eq!(duplicate_key(&receipts), Some((1, MerchantKey::Id(1))));
    }

    #[test]
    fn merchantless_receipts_share_the_sentinel_bucket() {
        let receipts = vec![receipt(1, None), receipt(1, None)];
        assert_eq!(duplicate_key(&receipts), Some((1, MerchantKey::Missing)));
    }

    #[test]
    fn distinct_buckets_pass() {
        let receipts = vec![receipt(1, Some(1)), receipt(1, Some(2)), receipt(2, Some(1)), receipt(1, None)];
        assert_eq!(duplicate_key(&receipts), None);
    }
}
