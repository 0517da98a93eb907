use serde::{Deserialize, Serialize};

/// which producer schema a reading was validated against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingKind {
    /// fixed sensor node: pm25, pm10, lat, lon required
    Node,
    /// mobile gps tracker: pm25, lat, lon required, pm10 optional
    Mobile,
}

impl ReadingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Mobile => "mobile",
        }
    }
}

/// a validated reading that has not been appended yet
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub kind: ReadingKind,
    pub node: Option<String>,
    pub pm25: f64,
    pub pm10: Option<f64>,
    pub lat: f64,
    pub lon: f64,
    /// epoch milliseconds, already normalized
    pub timestamp: i64,
}

/// one timestamped pm2.5/pm10 + location sample as stored in history
///
/// this is also the exact payload of `GET /data` elements and `new-data` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// position in the relay's append order, starts at 1
    pub seq: u64,
    pub kind: ReadingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// µg/m³
    pub pm25: f64,
    /// µg/m³, absent for mobile readings that did not carry it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    pub lat: f64,
    pub lon: f64,
    /// epoch milliseconds
    pub timestamp: i64,
}

impl Reading {
    pub fn from_measurement(seq: u64, m: Measurement) -> Self {
        Self {
            seq,
            kind: m.kind,
            node: m.node,
            pm25: m.pm25,
            pm10: m.pm10,
            lat: m.lat,
            lon: m.lon,
            timestamp: m.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_reading_omits_absent_fields() {
        let r = Reading {
            seq: 7,
            kind: ReadingKind::Mobile,
            node: None,
            pm25: 12.0,
            pm10: None,
            lat: 45.46,
            lon: 9.19,
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "mobile");
        assert!(json.get("pm10").is_none());
        assert!(json.get("node").is_none());

        let back: Reading = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
