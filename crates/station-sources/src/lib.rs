//! Upstream source clients for the station pipeline.
//!
//! Each client implements [`SourceClient`]: it resolves which stations a
//! cycle should cover, then fetches and decodes their latest observation
//! and metadata into the canonical records of `station-common`. All
//! outbound requests go through a per-client [`ConcurrencyGate`].

pub mod client;
pub mod composite;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod isd;
pub mod ndbc;
pub mod nws;
pub mod openmeteo;
pub mod oscar;
pub mod resolver;

pub use client::{fetch_batch, SourceClient, StationRef};
pub use config::{
    ConfiguredLocation, IsdConfig, LocationSource, NdbcConfig, NwsConfig, OpenMeteoConfig,
    OscarConfig,
};
pub use error::{Result, SourceError};
pub use gate::ConcurrencyGate;
pub use isd::IsdClient;
pub use ndbc::NdbcClient;
pub use nws::NwsClient;
pub use openmeteo::OpenMeteoClient;
pub use oscar::OscarClient;
pub use resolver::{ActivePolicy, Resolution, Selection, StationResolver};
