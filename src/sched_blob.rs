//! Encode/decode the per-host SEAS state blob (C2): a fixed-arity
//! `;`-delimited record inside a base64 envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// The seven-field SEAS uptime-predictor state, in the canonical field order.
/// Field ordering is part of the wire contract and never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedBlob {
    /// Running mean of total predicted uptime windows, in seconds.
    pub uptime_avg: f64,
    /// Count of samples contributing to `uptime_avg`.
    pub samples: u32,
    /// Origin (epoch seconds) for "remaining uptime" math.
    pub start_time: f64,
    /// Last observed discharge rate, seconds per percentage point. > 0 once initialized.
    pub dr: f64,
    /// Charge percentage at the previous sample.
    pub last_charge_pct: f64,
    /// Epoch seconds of the previous sample.
    pub last_update_time: f64,
    /// High-water mark of CPUs the host has advertised.
    pub total_cpus: u32,
}

impl Default for SchedBlob {
    fn default() -> Self {
        Self {
            uptime_avg: 0.0,
            samples: 0,
            start_time: 0.0,
            dr: 0.0,
            last_charge_pct: 0.0,
            last_update_time: 0.0,
            total_cpus: 0,
        }
    }
}

const FIELD_COUNT: usize = 7;

impl SchedBlob {
    /// Decode a base64 blob into a record. Empty input, undecodable base64,
    /// or a decoded body with no fields all yield a zero-initialized record.
    /// A decoded body with 1..7 fields is treated as a zero-initialized tail
    /// (accepting older 5/6-field schema variants); a body with more than 7
    /// fields uses the first 7 and ignores the rest.
    pub fn decode(blob: &str) -> Self {
        if blob.is_empty() {
            return Self::default();
        }

        let raw = match BASE64.decode(blob.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return Self::default(),
        };
        let text = match String::from_utf8(raw) {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };

        let fields: Vec<&str> = text.split(';').filter(|s| !s.is_empty()).collect();
        if fields.is_empty() {
            return Self::default();
        }

        let get = |i: usize| -> &str { fields.get(i).copied().unwrap_or("0") };
        let parse_f64 = |s: &str| s.trim().parse::<f64>().unwrap_or(0.0);
        let parse_u32 = |s: &str| s.trim().parse::<u32>().unwrap_or(0);

        Self {
            uptime_avg: parse_f64(get(0)),
            samples: parse_u32(get(1)),
            start_time: parse_f64(get(2)),
            dr: parse_f64(get(3)),
            last_charge_pct: parse_f64(get(4)),
            last_update_time: parse_f64(get(5)),
            total_cpus: parse_u32(get(6)),
        }
    }

    /// Encode the record as seven `;`-separated fields with a trailing
    /// separator, then base64.
    pub fn encode(&self) -> String {
        let text = format!(
            "{};{};{};{};{};{};{};",
            self.uptime_avg,
            self.samples,
            self.start_time,
            self.dr,
            self.last_charge_pct,
            self.last_update_time,
            self.total_cpus,
        );
        BASE64.encode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_decodes_to_zero_record() {
        assert_eq!(SchedBlob::decode(""), SchedBlob::default());
    }

    #[test]
    fn round_trips_within_float_precision() {
        let blob = SchedBlob {
            uptime_avg: 12345.6789,
            samples: 42,
            start_time: 1_700_000_000.0,
            dr: 300.5,
            last_charge_pct: 87.25,
            last_update_time: 1_700_000_600.0,
            total_cpus: 4,
        };
        let decoded = SchedBlob::decode(&blob.encode());
        assert!((decoded.uptime_avg - blob.uptime_avg).abs() < 1e-6);
        assert_eq!(decoded.samples, blob.samples);
        assert!((decoded.start_time - blob.start_time).abs() < 1e-6);
        assert!((decoded.dr - blob.dr).abs() < 1e-6);
        assert!((decoded.last_charge_pct - blob.last_charge_pct).abs() < 1e-6);
        assert!((decoded.last_update_time - blob.last_update_time).abs() < 1e-6);
        assert_eq!(decoded.total_cpus, blob.total_cpus);
    }

    #[test]
    fn short_prefix_fills_zero_tail() {
        // Only 3 of 7 fields present (legacy 3-field-style blob).
        let text = "100.0;5;1700000000.0;";
        let blob = SchedBlob::decode(&base64::engine::general_purpose::STANDARD.encode(text));
        assert_eq!(blob.uptime_avg, 100.0);
        assert_eq!(blob.samples, 5);
        assert_eq!(blob.start_time, 1700000000.0);
        assert_eq!(blob.dr, 0.0);
        assert_eq!(blob.total_cpus, 0);
    }

    #[test]
    fn non_numeric_fields_decode_to_zero() {
        let text = "garbage;not_a_number;x;y;z;w;v;";
        let blob = SchedBlob::decode(&base64::engine::general_purpose::STANDARD.encode(text));
        assert_eq!(blob, SchedBlob::default());
    }

    #[test]
    fn extra_trailing_fields_are_ignored() {
        let text = "1;2;3;4;5;6;7;future;fields;here;";
        let blob = SchedBlob::decode(&base64::engine::general_purpose::STANDARD.encode(text));
        assert_eq!(blob.total_cpus, 7);
    }

    #[test]
    fn malformed_base64_decodes_to_zero_record() {
        assert_eq!(SchedBlob::decode("not valid base64!!!"), SchedBlob::default());
    }
}
