use chrono::{DateTime, Utc};
use log::trace;
use serde::Serialize;
use std::collections::HashMap;

use crate::metering_dlms::structs::{Measurement, MeasurementKind, MeasurementValue};

/// Receives the numeric values of one measurement kind
pub trait NumericSink {
    fn publish_state(&mut self, value: f64);
}

/// Receives the text values of one measurement kind
pub trait TextSink {
    fn publish_state(&mut self, value: &str);
}

impl<F: FnMut(f64)> NumericSink for F {
    fn publish_state(&mut self, value: f64) {
        self(value)
    }
}

impl<F: FnMut(&str)> TextSink for F {
    fn publish_state(&mut self, value: &str) {
        self(value)
    }
}

/// At most one sink per measurement kind. Kinds without a sink are dropped.
#[derive(Default)]
pub struct SinkRegistry {
    numeric: HashMap<MeasurementKind, Box<dyn NumericSink + Send>>,
    text: HashMap<MeasurementKind, Box<dyn TextSink + Send>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any sink registered for `kind` before
    pub fn register_numeric<S: NumericSink + Send + 'static>(&mut self, kind: MeasurementKind, sink: S) {
        self.numeric.insert(kind, Box::new(sink));
    }

    pub fn register_text<S: TextSink + Send + 'static>(&mut self, kind: MeasurementKind, sink: S) {
        self.text.insert(kind, Box::new(sink));
    }

    pub fn is_registered(&self, kind: MeasurementKind) -> bool {
        self.numeric.contains_key(&kind) || self.text.contains_key(&kind)
    }

    /// Returns false if nobody listens to this kind
    pub fn deliver(&mut self, measurement: &Measurement) -> bool {
        let delivered = match &measurement.value {
            MeasurementValue::Number(value) => match self.numeric.get_mut(&measurement.kind) {
                Some(sink) => { NumericSink::publish_state(sink.as_mut(), *value); true },
                None => false,
            },
            MeasurementValue::Text(value) => match self.text.get_mut(&measurement.kind) {
                Some(sink) => { TextSink::publish_state(sink.as_mut(), value); true },
                None => false,
            },
        };

        if !delivered {
            trace!("No sink for {:?}", measurement.kind);
        }
        delivered
    }
}

/// All values of one telegram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterReading {
    pub meter_name: String,
    pub received_at: DateTime<Utc>,
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl MeterReading {
    pub fn new(meter_name: &str) -> Self {
        return MeterReading {
            meter_name: meter_name.to_string(),
            received_at: Utc::now(),
            values: serde_json::Map::new(),
        };
    }

    pub fn insert(&mut self, measurement: &Measurement) {
        let value = match &measurement.value {
            MeasurementValue::Number(n) => serde_json::Value::from(*n),
            MeasurementValue::Text(s) => serde_json::Value::from(s.as_str()),
        };
        self.values.insert(measurement.kind.name().to_string(), value);
    }

    pub fn number(&self, kind: MeasurementKind) -> Option<f64> {
        self.values.get(kind.name()).and_then(|v| v.as_f64())
    }

    pub fn text(&self, kind: MeasurementKind) -> Option<&str> {
        self.values.get(kind.name()).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_deliver_to_registered_sinks() {
        let voltages = Arc::new(Mutex::new(Vec::new()));
        let names = Arc::new(Mutex::new(Vec::new()));

        let mut registry = SinkRegistry::new();
        let v = voltages.clone();
        registry.register_numeric(MeasurementKind::VoltageL1, move |value: f64| v.lock().unwrap().push(value));
        let n = names.clone();
        registry.register_text(MeasurementKind::MeterNumber, move |value: &str| n.lock().unwrap().push(value.to_string()));

        assert!(registry.deliver(&Measurement::number(MeasurementKind::VoltageL1, 230.1)));
        assert!(registry.deliver(&Measurement::text(MeasurementKind::MeterNumber, "1234567890AB".to_string())));
        assert!(!registry.deliver(&Measurement::number(MeasurementKind::VoltageL2, 229.0)));
        /* A text value never ends up in a numeric sink */
        assert!(!registry.deliver(&Measurement::text(MeasurementKind::VoltageL1, "x".to_string())));

        assert_eq!(*voltages.lock().unwrap(), vec![230.1]);
        assert_eq!(*names.lock().unwrap(), vec!["1234567890AB".to_string()]);
        assert!(registry.is_registered(MeasurementKind::VoltageL1));
        assert!(!registry.is_registered(MeasurementKind::CurrentL1));
    }

    #[test]
    fn test_register_replaces_sink() {
        let hits = Arc::new(Mutex::new((0, 0)));
        let mut registry = SinkRegistry::new();

        let h = hits.clone();
        registry.register_numeric(MeasurementKind::PowerFactor, move |_: f64| h.lock().unwrap().0 += 1);
        let h = hits.clone();
        registry.register_numeric(MeasurementKind::PowerFactor, move |_: f64| h.lock().unwrap().1 += 1);

        registry.deliver(&Measurement::number(MeasurementKind::PowerFactor, 0.999));
        assert_eq!(*hits.lock().unwrap(), (0, 1));
    }

    #[test]
    fn test_meter_reading() {
        let mut reading = MeterReading::new("kaifa");
        reading.insert(&Measurement::number(MeasurementKind::ActiveEnergyPlus, 123456.0));
        reading.insert(&Measurement::text(MeasurementKind::Timestamp, "2023-06-15T12:30:45Z".to_string()));

        assert_eq!(reading.number(MeasurementKind::ActiveEnergyPlus), Some(123456.0));
        assert_eq!(reading.text(MeasurementKind::Timestamp), Some("2023-06-15T12:30:45Z"));
        assert_eq!(reading.number(MeasurementKind::VoltageL1), None);

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["meter_name"], "kaifa");
        assert_eq!(json["values"]["active_energy_plus"], 123456.0);
    }
}
