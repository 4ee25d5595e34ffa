mod auth_service;
mod error;
mod login_throttle;
mod magic_link_service;
mod token_service;

pub use auth_service::*;
pub use error::*;
pub use login_throttle::*;
pub use magic_link_service::*;
pub use token_service::*;
