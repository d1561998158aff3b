pub mod error;
pub mod markers;
pub mod panel;
pub mod profiles;
pub mod sse;
pub mod thread;
pub mod tools;
