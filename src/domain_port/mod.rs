// store

mod revocation_store;

pub use revocation_store::*;

// repo

mod audit_log;
mod user_repo;

pub use audit_log::*;
pub use user_repo::*;

// delivery

mod email_sender;

pub use email_sender::*;
