use log::{debug, trace, warn};

use super::cursor::ByteCursor;
use super::meter_definitions::lookup_kind;
use super::structs::{Accuracy, DataType, Measurement, MeasurementKind, Medium};
use super::DlmsParseError;
use crate::obis_utils::ObisCode;

const METER_NUMBER_LENGTH: usize = 12;
const STATUS_FIELD_LENGTH: usize = 2;
const SEPARATOR_TAG: u8 = 0x0F;
const SEPARATOR_LENGTH: usize = 4;

/// Walks the records of a decrypted data-notification.
///
/// Every record starts with an octet string header. Two records are
/// recognised by position instead of by code: the 12 byte date-time right at
/// the start offset and the meter number following a 0xFF byte. For those the
/// header is the value itself. All other records carry an OBIS code that is
/// followed by the typed value, a two byte status and an optional separator.
pub struct ObisWalker<'a> {
    cursor: ByteCursor<'a>,
    start_offset: usize,
}

/// Outcome of a single record
struct Record {
    kind: MeasurementKind,
    measurement: Option<Measurement>,
}

impl<'a> ObisWalker<'a> {
    pub fn new(plaintext: &'a [u8], start_offset: usize) -> Self {
        Self {
            cursor: ByteCursor::new(plaintext, start_offset),
            start_offset,
        }
    }

    /// Decodes records until the plaintext is used up. Measurements are handed
    /// to `deliver` as soon as they are decoded, an error stops the walk.
    /// Returns the number of records seen.
    pub fn walk<F: FnMut(Measurement)>(mut self, mut deliver: F) -> Result<usize, DlmsParseError> {
        let mut records = 0;

        while !self.cursor.is_exhausted() {
            let record = self.next_record()?;
            records += 1;

            match record.measurement {
                Some(measurement) => deliver(measurement),
                None => trace!("Nothing to deliver for {:?}", record.kind),
            }
        }

        Ok(records)
    }

    fn next_record(&mut self) -> Result<Record, DlmsParseError> {
        let record_start = self.cursor.position();
        trace!("currentPosition: {record_start}");

        let header = self.cursor.peek_at(0)?;
        if header != DataType::OctetString.tag() {
            return Err(DlmsParseError::UnsupportedHeaderType(header));
        }

        let code_length = self.cursor.peek_at(1)?;
        if code_length != 6 && code_length != 12 {
            return Err(DlmsParseError::UnsupportedHeaderLength(code_length));
        }
        let code = self.cursor.peek_slice(2, code_length as usize)?;

        let first_record = record_start == self.start_offset;
        let timestamp_found = first_record && code_length == 12;
        let meter_number_found = !first_record && self.cursor.peek_back(1) == Some(0xFF);

        let kind = if timestamp_found {
            trace!("Found Timestamp without obisMedium");
            MeasurementKind::Timestamp
        } else if meter_number_found {
            trace!("Found MeterNumber without obisMedium");
            MeasurementKind::MeterNumber
        } else {
            self.cursor.advance(code_length as usize + 2);
            Self::classify(code)?
        };

        let data_type = self.cursor.read_u8()?;
        let measurement = match DataType::from_tag(data_type) {
            Some(DataType::DoubleLongUnsigned) => {
                let value = self.cursor.read_u32_be()? as f64;
                debug!("{:?}: {value}", kind);
                kind.is_counter().then(|| Measurement::number(kind, value))
            }
            Some(DataType::LongUnsigned) => {
                /* The scaler sits in the structure following the value */
                let accuracy = Accuracy::from_byte(self.cursor.peek_at(5)?);
                let mut value = accuracy.apply(self.cursor.read_u16_be()?);
                if kind == MeasurementKind::PowerFactor {
                    value /= 1000.0;
                }
                debug!("{:?}: {value} ({:?})", kind, accuracy);
                kind.is_instantaneous().then(|| Measurement::number(kind, value))
            }
            Some(DataType::OctetString) => {
                let length = self.cursor.read_u8()? as usize;
                let data = self.cursor.read_bytes(length)?;
                let text = match kind {
                    MeasurementKind::Timestamp => match format_timestamp(data) {
                        Ok(timestamp) => Some(timestamp),
                        Err(e) => {
                            warn!("Skipping timestamp: {e}");
                            None
                        }
                    },
                    MeasurementKind::MeterNumber => Some(ascii_text(&data[..data.len().min(METER_NUMBER_LENGTH)])),
                    MeasurementKind::SerialNumber | MeasurementKind::DeviceName => Some(ascii_text(data)),
                    _ => None,
                };
                debug!("{:?}: {:?}", kind, text);
                text.map(|text| Measurement::text(kind, text))
            }
            _ => return Err(DlmsParseError::UnsupportedDataType(data_type)),
        };

        if !timestamp_found {
            self.cursor.advance(STATUS_FIELD_LENGTH);
        }

        if self.cursor.peek_at(0).ok() == Some(SEPARATOR_TAG) {
            self.cursor.advance(SEPARATOR_LENGTH);
        }

        Ok(Record { kind, measurement })
    }

    fn classify(code: &[u8]) -> Result<MeasurementKind, DlmsParseError> {
        let obis = ObisCode::from_bytes(code).ok_or(DlmsParseError::UnsupportedHeaderLength(code.len() as u8))?;

        let medium = match Medium::from_byte(obis.medium) {
            Some(medium @ (Medium::Electricity | Medium::Abstract)) => medium,
            _ => return Err(DlmsParseError::UnsupportedMedium(obis.medium)),
        };

        let kind = lookup_kind(medium, obis.indicator, obis.mode);
        if kind == MeasurementKind::Unknown {
            warn!("Unsupported OBIS code {} ({})", obis, obis.description().unwrap_or("no description"));
        } else {
            trace!("OBIS code {obis} is {:?}", kind);
        }

        Ok(kind)
    }
}

/// Date-time octet string: year (2 bytes), month, day, day of week, hour,
/// minute, second, followed by fields that are ignored
pub fn format_timestamp(data: &[u8]) -> Result<String, DlmsParseError> {
    if data.len() < 8 {
        return Err(DlmsParseError::InvalidTimestamp(data.len()));
    }

    let year = u16::from_be_bytes([data[0], data[1]]);
    let (month, day) = (data[2], data[3]);
    let (hour, minute, second) = (data[5], data[6], data[7]);

    Ok(format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z"))
}

/// Printable text up to the first NUL byte
pub fn ascii_text(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}
