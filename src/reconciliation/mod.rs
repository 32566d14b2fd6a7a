// Pure receiving/reconciliation logic. Everything here is DB-free and
// synchronous so it can be driven from any handler and tested standalone.
pub mod aggregate;
pub mod merchant_group;
pub mod reconcile;
pub mod resolution;
pub mod split;
