use axum::{Router, routing::{get, post, put, delete}, middleware};
use crate::state::AppState;
use crate::handlers::merchant::{
    create_merchant, delete_merchant, get_merchant, list_merchants, list_transactions,
    merchant_performance, update_merchant,
};
use crate::handlers::merchant_contact::{create_contact, delete_contact, list_contacts, update_contact};
use crate::handlers::merchant_document::{create_document, delete_document, list_documents};
use crate::middleware::auth::require_auth;

pub fn routes() -> Router<AppState> {
    let open = Router::new()
        .route("/merchants", get(list_merchants))
        .route("/merchants/{id}", get(get_merchant))
        .route("/merchants/{id}/transactions", get(list_transactions))
        .route("/merchants/{id}/performance", get(merchant_performance))
        .route("/merchants/{id}/contacts", get(list_contacts))
        .route("/merchants/{id}/documents", get(list_documents));

    let protected = Router::new()
        .route("/merchants", post(create_merchant))
        .route("/merchants/{id}", put(update_merchant).delete(delete_merchant))
        .route("/merchants/{id}/contacts", post(create_contact))
        .route("/merchants/{id}/contacts/{contact_id}", put(update_contact).delete(delete_contact))
        .route("/merchants/{id}/documents", post(create_document))
        .route("/merchants/{id}/documents/{doc_id}", delete(delete_document))
        .layer(middleware::from_fn(require_auth));

    open.merge(protected)
}
