mod auth_service_impl;
mod email_sender_fake;
mod jwt_codec;
mod login_throttle_impl;
mod magic_link_service_impl;
mod token_service_impl;

pub use auth_service_impl::*;
pub use email_sender_fake::*;
pub use jwt_codec::*;
pub use login_throttle_impl::*;
pub use magic_link_service_impl::*;
pub use token_service_impl::*;
