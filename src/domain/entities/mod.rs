pub mod balance;
pub mod exchange_connection;
pub mod log_entry;
pub mod order;
pub mod position;
pub mod strategy;
pub mod system_status;
pub mod trade;

pub use balance::{Balance, BalanceKey};
pub use exchange_connection::ExchangeConnection;
pub use log_entry::LogEntry;
pub use order::Order;
pub use position::Position;
pub use strategy::{Strategy, StrategyMergePolicy};
pub use system_status::{Stats, SystemStatus};
pub use trade::Trade;
