use std::collections::BTreeMap;
use std::fmt;

use crate::proto::{ProtoError, Result};

/// A quantity the flow meter can report. The variant order is the order in
/// which selected quantities appear on a data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantity {
    Flow,
    Temperature,
    Pressure,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Flow, Quantity::Temperature, Quantity::Pressure];

    /// Short key used in records and output headers.
    pub fn key(&self) -> &'static str {
        match self {
            Quantity::Flow => "flow",
            Quantity::Temperature => "temp",
            Quantity::Pressure => "press",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Field-selection mask of a flow/temperature/pressure measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub flow: bool,
    pub temperature: bool,
    pub pressure: bool,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            flow: true,
            temperature: true,
            pressure: true,
        }
    }

    pub fn is_selected(&self, quantity: Quantity) -> bool {
        match quantity {
            Quantity::Flow => self.flow,
            Quantity::Temperature => self.temperature,
            Quantity::Pressure => self.pressure,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.flow || self.temperature || self.pressure)
    }

    /// The `F|x`, `T|x`, `P|x` part of the measurement command.
    pub fn mnemonic(&self) -> String {
        [
            (self.flow, 'F'),
            (self.temperature, 'T'),
            (self.pressure, 'P'),
        ]
        .iter()
        .map(|(on, c)| if *on { *c } else { 'x' })
        .collect()
    }

    /// Map from field index on a data line to quantity.
    pub fn field_map(&self) -> Result<FieldMap> {
        if self.is_empty() {
            return Err(ProtoError::InvalidSelection);
        }
        Ok(FieldMap(
            Quantity::ALL
                .iter()
                .copied()
                .filter(|q| self.is_selected(*q))
                .collect(),
        ))
    }
}

/// Field index to quantity mapping, fixed for the duration of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap(Vec<Quantity>);

impl FieldMap {
    pub fn quantities(&self) -> &[Quantity] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode one comma separated data line.
    ///
    /// Every field must parse as a float and the number of fields must match
    /// the number of selected quantities.
    pub fn decode(&self, line: &str) -> Result<Sample> {
        let malformed = || ProtoError::MalformedSample {
            raw: line.to_string(),
        };
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != self.0.len() {
            return Err(malformed());
        }
        let values = fields
            .iter()
            .zip(self.0.iter())
            .map(|(field, quantity)| {
                field
                    .trim()
                    .parse::<f64>()
                    .map(|v| (*quantity, v))
                    .map_err(|_| malformed())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Sample { values })
    }
}

/// One decoded data line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Vec<(Quantity, f64)>,
}

impl Sample {
    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        self.values
            .iter()
            .find(|(q, _)| *q == quantity)
            .map(|(_, v)| *v)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.values.iter().map(|(_, v)| v.to_string()).collect();
        f.write_str(&fields.join(","))
    }
}

/// Decoded samples of one streamed measurement, per selected quantity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementRecord {
    series: BTreeMap<Quantity, Vec<f64>>,
}

impl MeasurementRecord {
    /// An empty sequence for every quantity of `map`.
    pub fn new(map: &FieldMap) -> Self {
        Self {
            series: map.quantities().iter().map(|q| (*q, Vec::new())).collect(),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        for (quantity, value) in sample.values {
            self.series.entry(quantity).or_default().push(value);
        }
    }

    pub fn get(&self, quantity: Quantity) -> Option<&[f64]> {
        self.series.get(&quantity).map(|v| v.as_slice())
    }

    pub fn flow(&self) -> Option<&[f64]> {
        self.get(Quantity::Flow)
    }

    pub fn temperature(&self) -> Option<&[f64]> {
        self.get(Quantity::Temperature)
    }

    pub fn pressure(&self) -> Option<&[f64]> {
        self.get(Quantity::Pressure)
    }

    pub fn quantities(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.series.keys().copied()
    }

    /// Number of decoded lines.
    pub fn len(&self) -> usize {
        self.series.values().map(|v| v.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selection(flow: bool, temperature: bool, pressure: bool) -> Selection {
        Selection {
            flow,
            temperature,
            pressure,
        }
    }

    #[test]
    fn test_field_map_keeps_fixed_order() {
        use Quantity::*;
        for mask in 1u8..8 {
            let sel = selection(mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
            let expected: Vec<Quantity> = [Flow, Temperature, Pressure]
                .into_iter()
                .filter(|q| sel.is_selected(*q))
                .collect();
            assert_eq!(sel.field_map().unwrap().quantities(), expected.as_slice());
        }
        assert_eq!(
            selection(false, true, true).field_map().unwrap().quantities(),
            &[Temperature, Pressure]
        );
    }

    #[test]
    fn test_empty_selection_rejected() {
        assert!(matches!(
            Selection::default().field_map(),
            Err(ProtoError::InvalidSelection)
        ));
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Selection::all().mnemonic(), "FTP");
        assert_eq!(selection(false, true, false).mnemonic(), "xTx");
        assert_eq!(selection(true, false, true).mnemonic(), "FxP");
    }

    #[test]
    fn test_decode_positions_follow_selection() {
        let map = selection(false, true, true).field_map().unwrap();
        let sample = map.decode("21.3, 101.2").unwrap();
        assert_eq!(sample.get(Quantity::Temperature), Some(21.3));
        assert_eq!(sample.get(Quantity::Pressure), Some(101.2));
        assert_eq!(sample.get(Quantity::Flow), None);
    }

    #[test]
    fn test_decode_rejects_bad_field() {
        let map = Selection::all().field_map().unwrap();
        match map.decode("1.0,abc,3.0") {
            Err(ProtoError::MalformedSample { raw }) => assert_eq!(raw, "1.0,abc,3.0"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        let map = selection(true, false, true).field_map().unwrap();
        assert!(matches!(
            map.decode("1.0"),
            Err(ProtoError::MalformedSample { .. })
        ));
        assert!(matches!(
            map.decode("1.0,2.0,3.0"),
            Err(ProtoError::MalformedSample { .. })
        ));
    }

    #[test]
    fn test_sample_prints_as_csv_row() {
        let map = selection(false, true, true).field_map().unwrap();
        let sample = map.decode(" 21.25 , 101.3 ").unwrap();
        assert_eq!(sample.to_string(), "21.25,101.3");
    }

    #[test]
    fn test_record_accumulates() {
        let map = selection(true, false, true).field_map().unwrap();
        let mut record = MeasurementRecord::new(&map);
        assert!(record.is_empty());
        record.push(map.decode("1.5,2.5").unwrap());
        record.push(map.decode("1.6,2.6").unwrap());
        assert_eq!(record.flow(), Some(&[1.5, 1.6][..]));
        assert_eq!(record.pressure(), Some(&[2.5, 2.6][..]));
        assert_eq!(record.temperature(), None);
        assert_eq!(record.len(), 2);
        assert_eq!(
            record.quantities().collect::<Vec<_>>(),
            vec![Quantity::Flow, Quantity::Pressure]
        );
    }
}
