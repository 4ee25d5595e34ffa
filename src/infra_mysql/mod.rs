mod audit_log_mysql;
mod user_repo_mysql;

pub use audit_log_mysql::*;
pub use user_repo_mysql::*;

mod util;
