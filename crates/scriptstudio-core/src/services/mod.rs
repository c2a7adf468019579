//! Shared services used across clients

mod store;
mod studio;

pub use store::LocalStore;
pub use studio::Studio;
