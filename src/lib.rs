//! Decoder for encrypted DLMS/COSEM smart meter telegrams
//!
//! This library collects the M-Bus frames a meter pushes over its customer
//! interface, decrypts them and hands every decoded OBIS value to a sink.

pub mod config;
pub mod metering_dlms;
pub mod obis_utils;
pub mod sinks;

// Re-export common types for easier access
pub use config::{Config, ConfigError, MeterConfig, SerialConfig};
pub use metering_dlms::{decode_telegram, ByteSource, DeliveryPolicy, DlmsMeter, DlmsParseError, TickOutcome};
pub use metering_dlms::structs::{Measurement, MeasurementKind, MeasurementValue};
pub use sinks::{MeterReading, NumericSink, SinkRegistry, TextSink};
