use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// The six value groups A-F of an OBIS code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObisCode {
    pub medium: u8,      // A: 0 abstract, 1 electricity, ...
    pub channel: u8,     // B
    pub indicator: u8,   // C: physical value
    pub mode: u8,        // D: processing method
    pub tariff: u8,      // E
    pub previous: u8,    // F: historical value / storage
}

impl ObisCode {
    /// Builds the code from the first six bytes, longer codes carry vendor data after them
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 6 {
            return None;
        }

        Some(ObisCode {
            medium: bytes[0],
            channel: bytes[1],
            indicator: bytes[2],
            mode: bytes[3],
            tariff: bytes[4],
            previous: bytes[5],
        })
    }

    /// "A-B:C.D.E" without the storage group, as used in the description table
    pub fn reduced(&self) -> String {
        format!("{}-{}:{}.{}.{}", self.medium, self.channel, self.indicator, self.mode, self.tariff)
    }

    pub fn description(&self) -> Option<&'static str> {
        get_obis_description(&self.reduced())
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}:{}.{}.{}.{}",
            self.medium, self.channel,
            self.indicator, self.mode,
            self.tariff, self.previous)
    }
}

lazy_static! {
    static ref OBIS_DESCRIPTIONS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();

        // Energy values
        map.insert("1-0:1.8.0", "Active energy + (total)");
        map.insert("1-0:1.8.1", "Active energy + (tariff 1)");
        map.insert("1-0:1.8.2", "Active energy + (tariff 2)");
        map.insert("1-0:2.8.0", "Active energy - (total)");
        map.insert("1-0:2.8.1", "Active energy - (tariff 1)");
        map.insert("1-0:2.8.2", "Active energy - (tariff 2)");

        // Reactive energy
        map.insert("1-0:3.8.0", "Reactive energy + (total)");
        map.insert("1-0:4.8.0", "Reactive energy - (total)");

        // Power values
        map.insert("1-0:1.7.0", "Active power + (total)");
        map.insert("1-0:2.7.0", "Active power - (total)");
        map.insert("1-0:3.7.0", "Reactive power + (total)");
        map.insert("1-0:4.7.0", "Reactive power - (total)");
        map.insert("1-0:15.7.0", "Absolute active instantaneous power");
        map.insert("1-0:16.7.0", "Sum active instantaneous power");
        map.insert("1-0:21.7.0", "Active power + (L1)");
        map.insert("1-0:41.7.0", "Active power + (L2)");
        map.insert("1-0:61.7.0", "Active power + (L3)");
        map.insert("1-0:13.7.0", "Power factor");
        map.insert("1-0:14.7.0", "Supply frequency");

        // Voltage values
        map.insert("1-0:32.7.0", "Voltage (L1)");
        map.insert("1-0:52.7.0", "Voltage (L2)");
        map.insert("1-0:72.7.0", "Voltage (L3)");

        // Current values
        map.insert("1-0:31.7.0", "Current (L1)");
        map.insert("1-0:51.7.0", "Current (L2)");
        map.insert("1-0:71.7.0", "Current (L3)");

        // Timestamp and identification
        map.insert("0-0:1.0.0", "Date and time");
        map.insert("0-0:42.0.0", "Logical device name");
        map.insert("0-0:96.1.0", "Device ID 1");
        map.insert("0-0:96.1.1", "Device ID 2");
        map.insert("0-0:0.2.0", "Firmware version");

        map
    };
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    OBIS_DESCRIPTIONS.get(obis_code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let code = ObisCode::from_bytes(&[0x01, 0x00, 0x20, 0x07, 0x00, 0xFF]).unwrap();
        assert_eq!(code.to_string(), "1-0:32.7.0.255");
        assert_eq!(code.reduced(), "1-0:32.7.0");
        assert_eq!(code.description(), Some("Voltage (L1)"));

        assert!(ObisCode::from_bytes(&[0x01, 0x00, 0x20]).is_none());
    }

    #[test]
    fn test_long_code_keeps_first_six_groups() {
        let bytes = [0x00, 0x00, 0x60, 0x01, 0x00, 0xFF, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46];
        let code = ObisCode::from_bytes(&bytes).unwrap();
        assert_eq!(code.to_string(), "0-0:96.1.0.255");
        assert_eq!(code.description(), Some("Device ID 1"));
    }

    #[test]
    fn test_get_obis_description() {
        assert_eq!(get_obis_description("1-0:1.8.1"), Some("Active energy + (tariff 1)"));
        assert_eq!(get_obis_description("1-0:15.7.0"), Some("Absolute active instantaneous power"));
        assert_eq!(get_obis_description("nonexistent"), None);
    }
}
