pub mod bounded_buffer;
pub mod engine_state;
pub mod shared_store;

pub use bounded_buffer::BoundedBuffer;
pub use engine_state::{EngineState, LogFilter, OrderFilter, StrategyCounts};
pub use shared_store::SharedStore;
