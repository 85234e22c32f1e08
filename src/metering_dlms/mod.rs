use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{ConfigError, MeterConfig};
use crate::sinks::{MeterReading, SinkRegistry};

pub mod accumulator;
pub mod crypto;
pub mod cursor;
pub mod meter_definitions;
pub mod obis_walker;
pub mod structs;
pub mod telegram;

use accumulator::ByteAccumulator;
use crypto::DecryptionKey;
use meter_definitions::MeterProfile;
use obis_walker::ObisWalker;
use structs::{Measurement, MeasurementKind};

/// Custom error types for DLMS telegram decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DlmsParseError {
    #[error("Buffer overflow, more than {0} bytes received")]
    BufferOverflow(usize),
    #[error("Received packet with invalid size {0}")]
    PacketTooSmall(usize),
    #[error("Payload length {payload} is too big for {available} received bytes")]
    PayloadExceedsFrame { payload: usize, available: usize },
    #[error("Second payload segment of {segment} bytes does not fit into the {available} bytes left")]
    SecondSegmentOverrun { segment: usize, available: usize },
    #[error("Frame ends before offset {0} required by the meter profile")]
    LayoutMismatch(usize),

    #[error("No decryption key configured")]
    KeyNotSet,
    #[error("Decryption key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Decryption key is not a hex string")]
    InvalidKeyFormat,

    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Authentication tag mismatch")]
    AuthenticationFailed,
    #[error("Packet was decrypted but data is invalid")]
    InvalidPlaintext,

    #[error("Unsupported OBIS header type {0:#04x}")]
    UnsupportedHeaderType(u8),
    #[error("Unsupported OBIS header length {0}")]
    UnsupportedHeaderLength(u8),
    #[error("Unsupported OBIS medium {0}")]
    UnsupportedMedium(u8),
    #[error("Unsupported OBIS data type {0:#04x}")]
    UnsupportedDataType(u8),
    #[error("Record at {position} is {needed} bytes short")]
    Truncated { position: usize, needed: usize },
    #[error("Timestamp needs 8 bytes, got {0}")]
    InvalidTimestamp(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Framing,
    Authentication,
    Structural,
    Configuration,
}

impl DlmsParseError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DlmsParseError::BufferOverflow(_)
            | DlmsParseError::PacketTooSmall(_)
            | DlmsParseError::PayloadExceedsFrame { .. }
            | DlmsParseError::SecondSegmentOverrun { .. }
            | DlmsParseError::LayoutMismatch(_) => ErrorClass::Framing,

            DlmsParseError::DecryptionFailed
            | DlmsParseError::AuthenticationFailed
            | DlmsParseError::InvalidPlaintext => ErrorClass::Authentication,

            DlmsParseError::UnsupportedHeaderType(_)
            | DlmsParseError::UnsupportedHeaderLength(_)
            | DlmsParseError::UnsupportedMedium(_)
            | DlmsParseError::UnsupportedDataType(_)
            | DlmsParseError::Truncated { .. }
            | DlmsParseError::InvalidTimestamp(_) => ErrorClass::Structural,

            DlmsParseError::KeyNotSet
            | DlmsParseError::InvalidKeyLength(_)
            | DlmsParseError::InvalidKeyFormat => ErrorClass::Configuration,
        }
    }
}

/// When decoded values reach the sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPolicy {
    /// Every value is published as soon as it is decoded. A structural error
    /// later in the telegram does not take back what was already published.
    #[default]
    Immediate,
    /// Values are held back until the whole telegram decoded successfully
    Atomic,
}

/// Runs one captured frame through validation, decryption and the OBIS walk.
/// Returns the number of records walked.
pub fn decode_telegram<F: FnMut(Measurement)>(frame: &[u8],
                                              profile: &MeterProfile,
                                              key: &DecryptionKey,
                                              deliver: F) -> Result<usize, DlmsParseError> {
    trace!("Frame: {}", hex::encode_upper(frame));

    telegram::validate_frame(frame, profile)?;
    debug!("Handling packet");

    let payload = telegram::extract_payload(frame, profile)?;
    let plaintext = crypto::decrypt(key, &payload.nonce, &payload.ciphertext, payload.tag.as_deref())?;
    crypto::check_plaintext(&plaintext)?;

    ObisWalker::new(&plaintext, profile.decoder_start_offset).walk(deliver)
}

/// Whatever delivers the raw bytes of the meter, usually a serial port
pub trait ByteSource {
    fn available(&self) -> usize;
    fn read(&mut self) -> Option<u8>;
}

impl ByteSource for VecDeque<u8> {
    fn available(&self) -> usize {
        self.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No complete frame yet
    Pending,
    Decoded(MeterReading),
    Rejected(DlmsParseError),
}

/// One smart meter on one serial line
pub struct DlmsMeter {
    name: String,
    accumulator: ByteAccumulator,
    profile: MeterProfile,
    key: Option<DecryptionKey>,
    sinks: SinkRegistry,
    delivery: DeliveryPolicy,
}

impl DlmsMeter {
    pub fn new(config: &MeterConfig) -> Result<Self, ConfigError> {
        let profile = config.resolve_profile()?;

        let key = match &config.key {
            Some(hex_key) => match DecryptionKey::from_hex(hex_key) {
                Ok(key) => Some(key),
                Err(e) => {
                    error!("Ignoring key of meter {}: {e}", config.name);
                    None
                }
            },
            None => None,
        };

        info!("DLMS meter {} created", config.name);

        return Ok(DlmsMeter {
            name: config.name.clone(),
            accumulator: ByteAccumulator::new(config.buffer_size,
                                              Duration::from_millis(config.read_timeout_ms)),
            profile,
            key,
            sinks: SinkRegistry::new(),
            delivery: config.delivery,
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// An empty key removes the current one. On error the current key stays.
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), DlmsParseError> {
        if key.is_empty() {
            self.key = None;
            return Ok(());
        }
        self.key = Some(DecryptionKey::new(key)?);
        Ok(())
    }

    pub fn sinks_mut(&mut self) -> &mut SinkRegistry {
        &mut self.sinks
    }

    pub fn dump_config(&self) {
        info!("DLMS Meter: {}", self.name);
        info!("  Key configured: {}", if self.key.is_some() { "YES" } else { "NO" });
        info!("  Delivery: {:?}", self.delivery);
        info!("  Buffer size: {}", self.accumulator.capacity());
        debug!("  Profile: {:?}", self.profile);
        for kind in MeasurementKind::ALL {
            if !self.sinks.is_registered(kind) {
                continue;
            }
            debug!("  Sink {}: unit {}, device class {}, state class {}",
                kind.name(),
                kind.unit().unwrap_or("-"),
                kind.device_class().unwrap_or("-"),
                kind.state_class().unwrap_or("-"));
        }
    }

    /// Drains the source and decodes a frame once the line went quiet.
    /// Never blocks; call it periodically.
    pub fn tick<S: ByteSource + ?Sized>(&mut self, source: &mut S, now: Instant) -> TickOutcome {
        let mut overflow = None;

        while source.available() > 0 {
            let Some(byte) = source.read() else {
                break;
            };
            if let Err(e) = self.accumulator.feed(byte, now) {
                overflow = Some(e);
            }
        }

        let Some(frame) = self.accumulator.poll(now) else {
            return match overflow {
                Some(e) => TickOutcome::Rejected(e),
                None => TickOutcome::Pending,
            };
        };

        match self.decode_frame(&frame) {
            Ok(reading) => TickOutcome::Decoded(reading),
            Err(e) => {
                match e.class() {
                    ErrorClass::Framing => warn!("Frame of {} bytes dropped: {e}", frame.len()),
                    _ => error!("Telegram rejected: {e}"),
                }
                TickOutcome::Rejected(e)
            }
        }
    }

    /// Decodes a complete frame and hands the values to the sinks according
    /// to the delivery policy
    pub fn decode_frame(&mut self, frame: &[u8]) -> Result<MeterReading, DlmsParseError> {
        let key = self.key.as_ref().ok_or(DlmsParseError::KeyNotSet)?;
        let mut reading = MeterReading::new(&self.name);

        match self.delivery {
            DeliveryPolicy::Immediate => {
                let sinks = &mut self.sinks;
                decode_telegram(frame, &self.profile, key, |m| {
                    sinks.deliver(&m);
                    reading.insert(&m);
                })?;
            }
            DeliveryPolicy::Atomic => {
                let mut pending = Vec::new();
                decode_telegram(frame, &self.profile, key, |m| pending.push(m))?;
                for m in pending.iter() {
                    self.sinks.deliver(m);
                    reading.insert(m);
                }
            }
        }

        info!("Received valid data");
        Ok(reading)
    }
}
