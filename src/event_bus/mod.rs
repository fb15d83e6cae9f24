//! Observability event fan-out.
//!
//! Pipeline stages emit structured [`Event`]s through their `NodeContext`;
//! the [`EventBus`] broadcasts them to pluggable sinks (stdout, memory,
//! channel) from a background listener task.

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{DiagnosticEvent, Event, NodeEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
