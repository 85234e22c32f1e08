use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::structs::{Medium, MeasurementKind};

pub const SYSTEM_TITLE_LENGTH: usize = 8;
pub const INVOCATION_COUNTER_LENGTH: usize = 4;
pub const DLMS_TAG_LENGTH: usize = 12;
/* Checksum and stop byte closing the second M-Bus frame */
pub const MBUS_TRAILER_LENGTH: usize = 2;

/* Defaults for the Kaifa MA309M as shipped by Austrian grid operators */
fn min_frame_size_default() -> usize { 256 }
fn header1_offset_default() -> usize { 0 }
fn header1_length_default() -> usize { 26 }
fn header2_offset_default() -> usize { 256 }
fn header2_length_default() -> usize { 9 }
fn system_title_offset_default() -> usize { 11 }
fn invocation_counter_offset_default() -> usize { 22 }
fn payload_length_default() -> usize { 243 }
fn first_segment_length_default() -> usize { 228 }
fn decoder_start_offset_default() -> usize { 20 }
fn tag_length_default() -> usize { 0 }

/// Frame layout of one meter model.
///
/// The telegram arrives as two M-Bus long frames. The first carries the
/// general-glo-ciphering header (system title, security control, invocation
/// counter) followed by the first ciphertext segment; the second frame has its
/// own short header followed by the rest of the ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterProfile {
    #[serde(default="min_frame_size_default")]
    pub min_frame_size: usize,
    #[serde(default="header1_offset_default")]
    pub header1_offset: usize,
    #[serde(default="header1_length_default")]
    pub header1_length: usize,
    #[serde(default="header2_offset_default")]
    pub header2_offset: usize,
    #[serde(default="header2_length_default")]
    pub header2_length: usize,
    #[serde(default="system_title_offset_default")]
    pub system_title_offset: usize,
    #[serde(default="invocation_counter_offset_default")]
    pub invocation_counter_offset: usize,
    #[serde(default="payload_length_default")]
    pub payload_length: usize,
    #[serde(default="first_segment_length_default")]
    pub first_segment_length: usize,
    #[serde(default="decoder_start_offset_default")]
    pub decoder_start_offset: usize,
    /// 0 for encryption-only telegrams, 12 when a GCM tag follows the ciphertext
    #[serde(default="tag_length_default")]
    pub tag_length: usize,
}

impl Default for MeterProfile {
    fn default() -> Self {
        kaifa_ma309m()
    }
}

impl MeterProfile {
    pub fn second_segment_length(&self) -> usize {
        self.payload_length.saturating_sub(self.first_segment_length)
    }

    pub fn first_segment_offset(&self) -> usize {
        self.header1_offset + self.header1_length
    }

    pub fn second_segment_offset(&self) -> usize {
        self.header2_offset + self.header2_length
    }

    /// Bytes of a complete telegram on the wire, the receive buffer must hold at least this
    pub fn frame_size(&self) -> usize {
        self.second_segment_offset() + self.second_segment_length() + self.tag_length + MBUS_TRAILER_LENGTH
    }

    /// Checks that the layout describes something the decoder can work with
    pub fn check(&self) -> Result<(), String> {
        if self.first_segment_length > self.payload_length {
            return Err(format!("first segment ({}) is longer than the payload ({})",
                               self.first_segment_length, self.payload_length));
        }
        if self.decoder_start_offset >= self.payload_length {
            return Err(format!("decoder start offset {} is outside the payload", self.decoder_start_offset));
        }
        if self.tag_length != 0 && self.tag_length != DLMS_TAG_LENGTH {
            return Err(format!("tag length must be 0 or {DLMS_TAG_LENGTH}, got {}", self.tag_length));
        }
        Ok(())
    }
}

pub fn kaifa_ma309m() -> MeterProfile {
    MeterProfile {
        min_frame_size: min_frame_size_default(),
        header1_offset: header1_offset_default(),
        header1_length: header1_length_default(),
        header2_offset: header2_offset_default(),
        header2_length: header2_length_default(),
        system_title_offset: system_title_offset_default(),
        invocation_counter_offset: invocation_counter_offset_default(),
        payload_length: payload_length_default(),
        first_segment_length: first_segment_length_default(),
        decoder_start_offset: decoder_start_offset_default(),
        tag_length: tag_length_default(),
    }
}

pub fn get_supported_meters() -> HashMap<&'static str, MeterProfile> {
    let mut meters = HashMap::new();
    meters.insert("kaifa_ma309m", kaifa_ma309m());
    meters
}

lazy_static! {
    /// (medium, C, D) -> measurement kind
    pub static ref OBIS_TABLE: HashMap<(Medium, u8, u8), MeasurementKind> = {
        let mut map = HashMap::new();

        map.insert((Medium::Abstract, 0x01, 0x00), MeasurementKind::Timestamp);
        map.insert((Medium::Abstract, 0x60, 0x01), MeasurementKind::SerialNumber);
        map.insert((Medium::Abstract, 0x2A, 0x00), MeasurementKind::DeviceName);

        map.insert((Medium::Electricity, 0x20, 0x07), MeasurementKind::VoltageL1);
        map.insert((Medium::Electricity, 0x34, 0x07), MeasurementKind::VoltageL2);
        map.insert((Medium::Electricity, 0x48, 0x07), MeasurementKind::VoltageL3);

        map.insert((Medium::Electricity, 0x1F, 0x07), MeasurementKind::CurrentL1);
        map.insert((Medium::Electricity, 0x33, 0x07), MeasurementKind::CurrentL2);
        map.insert((Medium::Electricity, 0x47, 0x07), MeasurementKind::CurrentL3);

        map.insert((Medium::Electricity, 0x01, 0x07), MeasurementKind::ActivePowerPlus);
        map.insert((Medium::Electricity, 0x02, 0x07), MeasurementKind::ActivePowerMinus);
        map.insert((Medium::Electricity, 0x0D, 0x07), MeasurementKind::PowerFactor);

        map.insert((Medium::Electricity, 0x01, 0x08), MeasurementKind::ActiveEnergyPlus);
        map.insert((Medium::Electricity, 0x02, 0x08), MeasurementKind::ActiveEnergyMinus);

        map.insert((Medium::Electricity, 0x03, 0x08), MeasurementKind::ReactiveEnergyPlus);
        map.insert((Medium::Electricity, 0x04, 0x08), MeasurementKind::ReactiveEnergyMinus);

        map
    };
}

pub fn lookup_kind(medium: Medium, c: u8, d: u8) -> MeasurementKind {
    OBIS_TABLE.get(&(medium, c, d)).copied().unwrap_or(MeasurementKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kaifa_defaults() {
        let profile = MeterProfile::default();
        assert_eq!(profile.min_frame_size, 256);
        assert_eq!(profile.payload_length, 243);
        assert_eq!(profile.first_segment_length, 228);
        assert_eq!(profile.second_segment_length(), 15);
        assert_eq!(profile.first_segment_offset(), 26);
        assert_eq!(profile.second_segment_offset(), 265);
        assert_eq!(profile.frame_size(), 282);
        assert!(profile.check().is_ok());
        assert!(get_supported_meters().contains_key("kaifa_ma309m"));
    }

    #[test]
    fn test_profile_check() {
        let mut profile = kaifa_ma309m();
        profile.tag_length = 16;
        assert!(profile.check().is_err());

        let mut profile = kaifa_ma309m();
        profile.first_segment_length = 300;
        assert!(profile.check().is_err());

        let mut profile = kaifa_ma309m();
        profile.tag_length = 12;
        assert_eq!(profile.frame_size(), 294);
    }

    #[test]
    fn test_obis_lookup() {
        assert_eq!(lookup_kind(Medium::Electricity, 32, 7), MeasurementKind::VoltageL1);
        assert_eq!(lookup_kind(Medium::Electricity, 13, 7), MeasurementKind::PowerFactor);
        assert_eq!(lookup_kind(Medium::Electricity, 4, 8), MeasurementKind::ReactiveEnergyMinus);
        assert_eq!(lookup_kind(Medium::Abstract, 96, 1), MeasurementKind::SerialNumber);
        /* Same C/D under the wrong medium is not a match */
        assert_eq!(lookup_kind(Medium::Abstract, 32, 7), MeasurementKind::Unknown);
        assert_eq!(lookup_kind(Medium::Electricity, 14, 7), MeasurementKind::Unknown);
    }
}
