mod email_sender_smtp;

pub use email_sender_smtp::*;
