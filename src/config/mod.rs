use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs::File;
use std::io::prelude::*;
use thiserror::Error;

use crate::metering_dlms::meter_definitions::{get_supported_meters, MeterProfile};
use crate::metering_dlms::DeliveryPolicy;

const CONFIG_PATHS: [&str; 2] = ["config/dlms.yaml", "dlms.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on {0}")]
    NotFound(String),
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Meter model {0} is not supported")]
    UnknownMeterModel(String),
    #[error("Invalid meter profile: {0}")]
    InvalidProfile(String),
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    None,
    Odd,
    Even,
}

fn serial_port_default() -> String { return "/dev/ttyUSB0".to_string() }
fn serial_baud_rate_default() -> u32 { return 2400 }
fn serial_parity_default() -> SerialParity { return SerialParity::Even }
fn serial_data_bits_default() -> u8 { return 8 }
fn serial_stop_bits_default() -> u8 { return 1 }
fn serial_poll_interval_ms_default() -> u64 { return 50 }

/// M-Bus line settings, the Kaifa meter talks 2400 8E1
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SerialConfig {
    #[serde(default="serial_port_default")]
    pub port: String,
    #[serde(default="serial_baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="serial_parity_default")]
    pub parity: SerialParity,
    #[serde(default="serial_data_bits_default")]
    pub data_bits: u8,
    #[serde(default="serial_stop_bits_default")]
    pub stop_bits: u8,
    #[serde(default="serial_poll_interval_ms_default")]
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: serial_port_default(),
            baud_rate: serial_baud_rate_default(),
            parity: serial_parity_default(),
            data_bits: serial_data_bits_default(),
            stop_bits: serial_stop_bits_default(),
            poll_interval_ms: serial_poll_interval_ms_default(),
        }
    }
}

fn meter_name_default() -> String { return "dlms_meter".to_string() }
fn meter_model_default() -> String { return "kaifa_ma309m".to_string() }
fn meter_read_timeout_ms_default() -> u64 { return 1000 }
fn meter_buffer_size_default() -> usize { return 1024 }
fn meter_delivery_default() -> DeliveryPolicy { return DeliveryPolicy::Immediate }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterConfig {
    #[serde(default="meter_name_default")]
    pub name: String,
    /// AES key as hex string, the meter is unusable without it
    pub key: Option<String>,
    #[serde(default="meter_model_default")]
    pub model: String,
    /// Replaces the layout of `model` when given
    pub profile: Option<MeterProfile>,
    #[serde(default="meter_read_timeout_ms_default")]
    pub read_timeout_ms: u64,
    #[serde(default="meter_buffer_size_default")]
    pub buffer_size: usize,
    #[serde(default="meter_delivery_default")]
    pub delivery: DeliveryPolicy,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            name: meter_name_default(),
            key: None,
            model: meter_model_default(),
            profile: None,
            read_timeout_ms: meter_read_timeout_ms_default(),
            buffer_size: meter_buffer_size_default(),
            delivery: meter_delivery_default(),
        }
    }
}

impl MeterConfig {
    pub fn resolve_profile(&self) -> Result<MeterProfile, ConfigError> {
        let profile = match &self.profile {
            Some(profile) => profile.clone(),
            None => get_supported_meters()
                .remove(self.model.as_str())
                .ok_or_else(|| ConfigError::UnknownMeterModel(self.model.clone()))?,
        };

        profile.check().map_err(ConfigError::InvalidProfile)?;
        if self.buffer_size < profile.frame_size() {
            return Err(ConfigError::InvalidProfile(format!(
                "buffer size {} can not hold a frame of {} bytes", self.buffer_size, profile.frame_size())));
        }
        Ok(profile)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub meter: MeterConfig,
}

impl Config {
    /// Reads `path` if given, otherwise the first of config/dlms.yaml and dlms.yaml
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let candidates: Vec<&str> = match path {
            Some(p) => vec![p],
            None => CONFIG_PATHS.to_vec(),
        };

        let mut file = None;
        for candidate in candidates.iter() {
            match File::open(candidate) {
                Ok(f) => {
                    info!("Loading config from {candidate}");
                    file = Some(f);
                    break;
                }
                Err(e) => debug!("No config at {candidate}: {e}"),
            }
        }

        let mut file = file.ok_or_else(|| ConfigError::NotFound(candidates.join(" or ")))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        return Config::parse(&contents);
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        c.meter.resolve_profile()?;
        Ok(c)
    }
}
