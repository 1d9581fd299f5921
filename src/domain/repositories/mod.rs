pub mod command_sink;
pub mod event_sink;

pub use command_sink::CommandSink;
pub use event_sink::EventSink;
