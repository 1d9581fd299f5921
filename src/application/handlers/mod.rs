pub mod connection_coordinator;
pub mod http;

pub use connection_coordinator::{
    ConnectionCoordinator, ConnectionIndicator, Notification, NotificationLevel,
};
pub use http::{router, ErrorResponse};
