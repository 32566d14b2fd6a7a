pub mod delivery;
pub mod issue;
pub mod merchant;
pub mod merchant_contact;
pub mod merchant_document;
pub mod purchase_order;
pub mod user;
