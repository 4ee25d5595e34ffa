mod email;
mod token;
mod user;

pub use email::*;
pub use token::*;
pub use user::*;
