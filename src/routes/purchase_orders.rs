use axum::{Router, routing::{get, post, put}, middleware};
use crate::state::AppState;
use crate::handlers::purchase_order::{
    create_purchase_order, get_purchase_order_with_deliveries, list_purchase_orders,
    update_purchase_order_status,
};
use crate::handlers::delivery::record_delivery;
use crate::handlers::issue::{list_active_issues, list_issues, resolve_issues};
use crate::middleware::auth::require_auth;

pub fn routes() -> Router<AppState> {
    // Public endpoints: reads
    let open = Router::new()
        .route("/purchase-orders", get(list_purchase_orders))
        .route("/purchase-orders/{id}/with-deliveries", get(get_purchase_order_with_deliveries))
        .route("/purchase-orders/{id}/issues", get(list_issues))
        .route("/purchase-orders/{id}/issues/active", get(list_active_issues));

    // Protected endpoints: mutations (JWT required)
    let protected = Router::new()
        .route("/purchase-orders", post(create_purchase_order))
        .route("/purchase-orders/{id}/status", put(update_purchase_order_status))
        .route("/purchase-orders/{id}/deliveries", post(record_delivery))
        .route("/purchase-orders/issues/resolve", post(resolve_issues))
        .layer(middleware::from_fn(require_auth));

    open.merge(protected)
}
