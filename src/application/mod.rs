pub mod actors;
pub mod context;
pub mod handlers;
pub mod services;

pub use context::AppContext;
