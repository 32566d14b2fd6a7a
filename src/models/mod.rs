pub mod purchase_order;
pub mod merchant;
pub mod user;
