pub mod merchants;
pub mod purchase_orders;
pub mod users;

use axum::Router;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(purchase_orders::routes())
        .merge(merchants::routes())
        .merge(users::routes())
}
