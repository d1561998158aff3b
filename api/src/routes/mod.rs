pub mod agents;
pub mod auth_callback;
pub mod chatkit;
pub mod health;
