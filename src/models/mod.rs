pub mod block;
pub mod comment;
pub mod question;
pub mod settings;
