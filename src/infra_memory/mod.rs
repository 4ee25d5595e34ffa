//! In-process adapters. They back the `memory` backends in settings and the
//! test suites; nothing here survives a restart.

mod audit_log_memory;
mod email_sender_recording;
mod revocation_store_memory;
mod user_repo_memory;

pub use audit_log_memory::*;
pub use email_sender_recording::*;
pub use revocation_store_memory::*;
pub use user_repo_memory::*;
