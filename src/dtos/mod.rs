pub mod delivery;
pub mod issue;
pub mod merchant;
pub mod purchase_order;
pub mod user;
