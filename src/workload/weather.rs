//! Per-station temperature summary (min, max, mean).
//!
//! A batch body looks like `Helsinki;15.0,London;16.2,...`.

use crate::utils::{bytes_to_floats, floats_to_bytes, string_from_bytes};
use crate::*;
use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;

pub fn map(payload: &Payload) -> MapOutput {
    let body = string_from_bytes(payload.data.clone())?;
    let readings = body
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| -> Result<KeyValue> {
            let (station, reading) = pair
                .split_once(';')
                .ok_or_else(|| anyhow!("reading `{pair}` has no `;` separator"))?;
            Ok(KeyValue::new(station, Bytes::copy_from_slice(reading.as_bytes())))
        })
        .collect::<Vec<_>>();
    Ok(Box::new(readings.into_iter()))
}

/// Parses every reading of a station and packs them as raw `f64`s.
pub fn reduce(key: &str, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let temperatures = values
        .map(|value| -> Result<f64> {
            let text = std::str::from_utf8(&value)?;
            text.trim()
                .parse::<f64>()
                .with_context(|| format!("station `{key}` has unreadable temperature `{text}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(floats_to_bytes(&temperatures))
}

/// Folds the packed readings of every batch into one [`Record`].
pub fn final_reduce(key: &str, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        for t in bytes_to_floats(&value) {
            count += 1;
            sum += t;
            min = min.min(t);
            max = max.max(t);
        }
    }
    if count == 0 {
        bail!("station `{key}` has no readings");
    }
    Ok(Record::new(min, max, sum / count as f64).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[&'static str]) -> Box<dyn Iterator<Item = Bytes>> {
        let values: Vec<Bytes> = raw.iter().map(|s| Bytes::from_static(s.as_bytes())).collect();
        Box::new(values.into_iter())
    }

    fn record(value: Bytes) -> Record {
        Record::from_bytes(&value).unwrap()
    }

    #[test]
    fn map_splits_station_readings() {
        let payload = Payload::new(
            1,
            1,
            "token",
            "Helsinski;15.0,London;16.2,Helsinski;13.2,Lisbon;12.1",
        );
        let kvs = map(&payload)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(
            kvs,
            vec![
                KeyValue::new("Helsinski", Bytes::from_static(b"15.0")),
                KeyValue::new("London", Bytes::from_static(b"16.2")),
                KeyValue::new("Helsinski", Bytes::from_static(b"13.2")),
                KeyValue::new("Lisbon", Bytes::from_static(b"12.1")),
            ]
        );
    }

    #[test]
    fn map_of_empty_body_is_empty() {
        let payload = Payload::new(1, 1, "", "");
        assert_eq!(map(&payload).unwrap().count(), 0);
    }

    #[test]
    fn map_rejects_reading_without_separator() {
        let payload = Payload::new(1, 1, "", "Helsinki;15.0,London");
        let mut kvs = map(&payload).unwrap();

        assert!(kvs.next().unwrap().is_ok());
        assert!(kvs.next().unwrap().is_err());
    }

    #[test]
    fn reduce_packs_parsed_readings() {
        let out = reduce("Helsinski", values(&["15.0", "13.2"])).unwrap();
        assert_eq!(out, floats_to_bytes(&[15.0, 13.2]));
    }

    #[test]
    fn reduce_rejects_non_numbers() {
        let err = reduce("London", values(&["16.2", "warm"])).unwrap_err();
        assert!(err.to_string().contains("London"));
    }

    #[test]
    fn final_reduce_across_batches() {
        let cases = [
            ("Helsinki", [15.0, 13.2], [14.5, 16.8], [13.2, 16.8, (15.0 + 13.2 + 14.5 + 16.8) / 4.0]),
            ("London", [16.2, 17.1], [15.9, 18.0], [15.9, 18.0, (16.2 + 17.1 + 15.9 + 18.0) / 4.0]),
            ("Lisbon", [22.3, 23.1], [21.5, 24.2], [21.5, 24.2, (22.3 + 23.1 + 21.5 + 24.2) / 4.0]),
        ];
        for (station, first, second, [min, max, avg]) in cases {
            let batches = vec![floats_to_bytes(&first), floats_to_bytes(&second)];
            let out = record(final_reduce(station, Box::new(batches.into_iter())).unwrap());

            assert!((out.min - min).abs() < 0.001, "{station} min");
            assert!((out.max - max).abs() < 0.001, "{station} max");
            assert!((out.avg - avg).abs() < 0.001, "{station} avg");
        }
    }

    #[test]
    fn final_reduce_without_readings_fails() {
        let empty = vec![Bytes::new()];
        assert!(final_reduce("Oslo", Box::new(empty.into_iter())).is_err());
    }
}
