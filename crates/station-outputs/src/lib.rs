//! Output side of the station pipeline.
//!
//! [`OutputFanout`] delivers each canonical record to every enabled
//! [`Sink`]: the rotating [`CsvSink`] that the sync service later replays,
//! and the [`StreamSink`] message bus.

pub mod config;
pub mod csv_sink;
pub mod error;
pub mod fanout;
pub mod sink;
pub mod stream_sink;

pub use config::{BusConfig, CsvConfig, OutputConfig};
pub use csv_sink::{daily_path, CsvSink};
pub use error::{Result, SinkError};
pub use fanout::OutputFanout;
pub use sink::Sink;
pub use stream_sink::{RedisPublisher, StreamPublisher, StreamSink};
