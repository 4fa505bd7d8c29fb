//! Session credentials and per-user cart state for the Sojourn client.

pub mod cart;
pub mod credentials;

pub use cart::{CartCache, CartFetcher, CartItem, CartSnapshot};
pub use credentials::CredentialStore;
