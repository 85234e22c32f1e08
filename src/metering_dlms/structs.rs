use serde::{Deserialize, Serialize};

/* Data type tags as they appear in the decrypted APDU */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    NullData,
    Array,
    Structure,
    Boolean,
    BitString,
    DoubleLong,
    DoubleLongUnsigned,
    OctetString,
    VisibleString,
    Utf8String,
    BinaryCodedDecimal,
    Integer,
    Long,
    Unsigned,
    LongUnsigned,
    CompactArray,
    Long64,
    Long64Unsigned,
    Enum,
    Float32,
    Float64,
    DateTime,
    Date,
    Time,
}

impl DataType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(DataType::NullData),
            0x01 => Some(DataType::Array),
            0x02 => Some(DataType::Structure),
            0x03 => Some(DataType::Boolean),
            0x04 => Some(DataType::BitString),
            0x05 => Some(DataType::DoubleLong),
            0x06 => Some(DataType::DoubleLongUnsigned),
            0x09 => Some(DataType::OctetString),
            0x0A => Some(DataType::VisibleString),
            0x0C => Some(DataType::Utf8String),
            0x0D => Some(DataType::BinaryCodedDecimal),
            0x0F => Some(DataType::Integer),
            0x10 => Some(DataType::Long),
            0x11 => Some(DataType::Unsigned),
            0x12 => Some(DataType::LongUnsigned),
            0x13 => Some(DataType::CompactArray),
            0x14 => Some(DataType::Long64),
            0x15 => Some(DataType::Long64Unsigned),
            0x16 => Some(DataType::Enum),
            0x17 => Some(DataType::Float32),
            0x18 => Some(DataType::Float64),
            0x19 => Some(DataType::DateTime),
            0x1A => Some(DataType::Date),
            0x1B => Some(DataType::Time),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            DataType::NullData => 0x00,
            DataType::Array => 0x01,
            DataType::Structure => 0x02,
            DataType::Boolean => 0x03,
            DataType::BitString => 0x04,
            DataType::DoubleLong => 0x05,
            DataType::DoubleLongUnsigned => 0x06,
            DataType::OctetString => 0x09,
            DataType::VisibleString => 0x0A,
            DataType::Utf8String => 0x0C,
            DataType::BinaryCodedDecimal => 0x0D,
            DataType::Integer => 0x0F,
            DataType::Long => 0x10,
            DataType::Unsigned => 0x11,
            DataType::LongUnsigned => 0x12,
            DataType::CompactArray => 0x13,
            DataType::Long64 => 0x14,
            DataType::Long64Unsigned => 0x15,
            DataType::Enum => 0x16,
            DataType::Float32 => 0x17,
            DataType::Float64 => 0x18,
            DataType::DateTime => 0x19,
            DataType::Date => 0x1A,
            DataType::Time => 0x1B,
        }
    }
}

/* OBIS value group A */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Medium {
    Abstract,
    Electricity,
    Heat,
    Gas,
    Water,
}

impl Medium {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Medium::Abstract),
            0x01 => Some(Medium::Electricity),
            0x06 => Some(Medium::Heat),
            0x07 => Some(Medium::Gas),
            0x08 => Some(Medium::Water),
            _ => None,
        }
    }
}

/// Scaler tag following a LongUnsigned value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    SingleDigit,
    DoubleDigit,
    Unscaled,
}

impl Accuracy {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0xFF => Accuracy::SingleDigit,
            0xFE => Accuracy::DoubleDigit,
            _ => Accuracy::Unscaled,
        }
    }

    pub fn apply(&self, raw: u16) -> f64 {
        match self {
            Accuracy::SingleDigit => raw as f64 / 10.0,
            Accuracy::DoubleDigit => raw as f64 / 100.0,
            Accuracy::Unscaled => raw as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Unknown,
    Timestamp,
    SerialNumber,
    DeviceName,
    MeterNumber,
    VoltageL1,
    VoltageL2,
    VoltageL3,
    CurrentL1,
    CurrentL2,
    CurrentL3,
    ActivePowerPlus,
    ActivePowerMinus,
    PowerFactor,
    ActiveEnergyPlus,
    ActiveEnergyMinus,
    ReactiveEnergyPlus,
    ReactiveEnergyMinus,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 17] = [
        MeasurementKind::Timestamp,
        MeasurementKind::SerialNumber,
        MeasurementKind::DeviceName,
        MeasurementKind::MeterNumber,
        MeasurementKind::VoltageL1,
        MeasurementKind::VoltageL2,
        MeasurementKind::VoltageL3,
        MeasurementKind::CurrentL1,
        MeasurementKind::CurrentL2,
        MeasurementKind::CurrentL3,
        MeasurementKind::ActivePowerPlus,
        MeasurementKind::ActivePowerMinus,
        MeasurementKind::PowerFactor,
        MeasurementKind::ActiveEnergyPlus,
        MeasurementKind::ActiveEnergyMinus,
        MeasurementKind::ReactiveEnergyPlus,
        MeasurementKind::ReactiveEnergyMinus,
    ];

    /// Name used for configuration keys and the JSON output
    pub fn name(&self) -> &'static str {
        match self {
            MeasurementKind::Unknown => "unknown",
            MeasurementKind::Timestamp => "timestamp",
            MeasurementKind::SerialNumber => "serial_number",
            MeasurementKind::DeviceName => "device_name",
            MeasurementKind::MeterNumber => "meter_number",
            MeasurementKind::VoltageL1 => "voltage_l1",
            MeasurementKind::VoltageL2 => "voltage_l2",
            MeasurementKind::VoltageL3 => "voltage_l3",
            MeasurementKind::CurrentL1 => "current_l1",
            MeasurementKind::CurrentL2 => "current_l2",
            MeasurementKind::CurrentL3 => "current_l3",
            MeasurementKind::ActivePowerPlus => "active_power_plus",
            MeasurementKind::ActivePowerMinus => "active_power_minus",
            MeasurementKind::PowerFactor => "power_factor",
            MeasurementKind::ActiveEnergyPlus => "active_energy_plus",
            MeasurementKind::ActiveEnergyMinus => "active_energy_minus",
            MeasurementKind::ReactiveEnergyPlus => "reactive_energy_plus",
            MeasurementKind::ReactiveEnergyMinus => "reactive_energy_minus",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self,
            MeasurementKind::Timestamp
            | MeasurementKind::SerialNumber
            | MeasurementKind::DeviceName
            | MeasurementKind::MeterNumber)
    }

    /* Kinds the meter sends as DoubleLongUnsigned */
    pub fn is_counter(&self) -> bool {
        matches!(self,
            MeasurementKind::ActivePowerPlus
            | MeasurementKind::ActivePowerMinus
            | MeasurementKind::ActiveEnergyPlus
            | MeasurementKind::ActiveEnergyMinus
            | MeasurementKind::ReactiveEnergyPlus
            | MeasurementKind::ReactiveEnergyMinus)
    }

    /* Kinds the meter sends as LongUnsigned with a scaler */
    pub fn is_instantaneous(&self) -> bool {
        matches!(self,
            MeasurementKind::VoltageL1
            | MeasurementKind::VoltageL2
            | MeasurementKind::VoltageL3
            | MeasurementKind::CurrentL1
            | MeasurementKind::CurrentL2
            | MeasurementKind::CurrentL3
            | MeasurementKind::PowerFactor)
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            MeasurementKind::VoltageL1 | MeasurementKind::VoltageL2 | MeasurementKind::VoltageL3 => Some("V"),
            MeasurementKind::CurrentL1 | MeasurementKind::CurrentL2 | MeasurementKind::CurrentL3 => Some("A"),
            MeasurementKind::ActivePowerPlus | MeasurementKind::ActivePowerMinus => Some("W"),
            MeasurementKind::ActiveEnergyPlus | MeasurementKind::ActiveEnergyMinus
            | MeasurementKind::ReactiveEnergyPlus | MeasurementKind::ReactiveEnergyMinus => Some("Wh"),
            _ => None,
        }
    }

    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            MeasurementKind::VoltageL1 | MeasurementKind::VoltageL2 | MeasurementKind::VoltageL3 => Some("voltage"),
            MeasurementKind::CurrentL1 | MeasurementKind::CurrentL2 | MeasurementKind::CurrentL3 => Some("current"),
            MeasurementKind::ActivePowerPlus | MeasurementKind::ActivePowerMinus => Some("power"),
            MeasurementKind::PowerFactor => Some("power_factor"),
            MeasurementKind::ActiveEnergyPlus
            | MeasurementKind::ActiveEnergyMinus
            | MeasurementKind::ReactiveEnergyPlus
            | MeasurementKind::ReactiveEnergyMinus => Some("energy"),
            _ => None,
        }
    }

    pub fn state_class(&self) -> Option<&'static str> {
        if self.is_counter() && self.device_class() == Some("energy") {
            return Some("total_increasing");
        }
        if self.is_text() || *self == MeasurementKind::Unknown {
            return None;
        }
        Some("measurement")
    }

    /// Decimal places worth displaying for this kind
    pub fn accuracy_decimals(&self) -> u8 {
        match self {
            MeasurementKind::VoltageL1 | MeasurementKind::VoltageL2 | MeasurementKind::VoltageL3 => 1,
            MeasurementKind::CurrentL1 | MeasurementKind::CurrentL2 | MeasurementKind::CurrentL3 => 2,
            MeasurementKind::PowerFactor => 3,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

/// One decoded value, handed to the sinks
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub value: MeasurementValue,
}

impl Measurement {
    pub fn number(kind: MeasurementKind, value: f64) -> Self {
        Self { kind, value: MeasurementValue::Number(value) }
    }

    pub fn text(kind: MeasurementKind, value: String) -> Self {
        Self { kind, value: MeasurementValue::Text(value) }
    }
}

/// Ciphertext and nonce cut out of a validated frame
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedPayload {
    pub system_title: [u8; 8],
    pub invocation_counter: u32,
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
    pub tag: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_tags() {
        for tag in 0..=0x1Bu8 {
            if let Some(data_type) = DataType::from_tag(tag) {
                assert_eq!(data_type.tag(), tag);
            }
        }
        assert_eq!(DataType::from_tag(0x09), Some(DataType::OctetString));
        assert_eq!(DataType::from_tag(0x07), None);
        assert_eq!(DataType::from_tag(0xFF), None);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(Accuracy::from_byte(0xFF).apply(2300), 230.0);
        assert_eq!(Accuracy::from_byte(0xFE).apply(2300), 23.0);
        assert_eq!(Accuracy::from_byte(0xFD).apply(2300), 2300.0);
        assert_eq!(Accuracy::from_byte(0x00), Accuracy::Unscaled);
    }

    #[test]
    fn test_kind_metadata() {
        assert_eq!(MeasurementKind::VoltageL2.unit(), Some("V"));
        assert_eq!(MeasurementKind::VoltageL2.accuracy_decimals(), 1);
        assert_eq!(MeasurementKind::ActiveEnergyPlus.state_class(), Some("total_increasing"));
        assert_eq!(MeasurementKind::ActivePowerMinus.state_class(), Some("measurement"));
        assert_eq!(MeasurementKind::PowerFactor.device_class(), Some("power_factor"));
        assert_eq!(MeasurementKind::PowerFactor.unit(), None);
        /* Reactive counters are published in the same unit as active energy */
        assert_eq!(MeasurementKind::ReactiveEnergyMinus.unit(), Some("Wh"));
        assert_eq!(MeasurementKind::ReactiveEnergyPlus.unit(), MeasurementKind::ActiveEnergyPlus.unit());
        assert_eq!(MeasurementKind::MeterNumber.state_class(), None);
        assert!(MeasurementKind::ALL.iter().all(|k| *k != MeasurementKind::Unknown));

        /* Every kind is either text, counter or instantaneous */
        for kind in MeasurementKind::ALL {
            let classes = [kind.is_text(), kind.is_counter(), kind.is_instantaneous()];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_serialized_names() {
        for kind in MeasurementKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.name());
        }
        let value = serde_json::to_value(MeasurementValue::Number(230.1)).unwrap();
        assert_eq!(value, 230.1);
    }
}
