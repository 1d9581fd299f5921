pub mod engine_client;
pub mod reconnect_policy;

#[cfg(test)]
pub mod tests;

pub use engine_client::*;
pub use reconnect_policy::ReconnectPolicy;
