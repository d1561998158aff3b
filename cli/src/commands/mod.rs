pub mod chat;
pub mod health;
pub mod profiles;
pub mod thread;
