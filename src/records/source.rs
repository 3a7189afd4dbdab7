use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use glob::glob;
use itertools::Itertools;
use tracing::debug;

use crate::Payload;

/// Every batch is sent with the same envelope fields.
pub const BATCH_VERSION: u16 = 1;
pub const BATCH_CLIENT_ID: u16 = 1;
pub const BATCH_IDENTIFIER: &str = "origin";

/// A run of input records joined into one payload body.
///
/// Fields of a record are joined with `;` and records with `,`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub id: u64,
    pub value: String,
}

impl Batch {
    pub fn into_payload(self) -> Payload {
        Payload::new(BATCH_VERSION, BATCH_CLIENT_ID, BATCH_IDENTIFIER, self.value)
    }
}

/// Reads every file matching a glob pattern, in path order, and yields
/// batches of at most `batch_size` records. Batches may span files.
pub struct BatchReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, csv::StringRecordsIntoIter<File>)>,
    batch_size: usize,
    next_id: u64,
}

impl BatchReader {
    pub fn open(pattern: &str, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            bail!("batch size must be greater than zero");
        }
        let files = glob(pattern)
            .with_context(|| format!("invalid input pattern {pattern}"))?
            .collect::<Result<Vec<_>, _>>()?;
        if files.is_empty() {
            bail!("no input files match {pattern}");
        }
        debug!(files = files.len(), pattern, "opened input");

        Ok(Self {
            files: files.into_iter(),
            current: None,
            batch_size,
            next_id: 1,
        })
    }

    fn next_record(&mut self) -> Option<Result<csv::StringRecord>> {
        loop {
            if let Some((path, records)) = &mut self.current {
                match records.next() {
                    Some(record) => {
                        return Some(
                            record.with_context(|| format!("error reading {}", path.display())),
                        )
                    }
                    None => self.current = None,
                }
            }

            let path = self.files.next()?;
            let reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&path);
            match reader {
                Ok(reader) => self.current = Some((path, reader.into_records())),
                Err(err) => {
                    return Some(
                        Err(err).with_context(|| format!("error opening {}", path.display())),
                    )
                }
            }
        }
    }
}

impl Iterator for BatchReader {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut records = Vec::with_capacity(self.batch_size.min(4096));
        while records.len() < self.batch_size {
            match self.next_record() {
                Some(Ok(record)) => records.push(record.iter().join(";")),
                Some(Err(err)) => return Some(Err(err)),
                None => break,
            }
        }
        if records.is_empty() {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        Some(Ok(Batch {
            id,
            value: records.join(","),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn batches_by_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("weather.csv"),
            "Helsinki;15.0\nLondon;9.0\nLisbon;20.5\n",
        )
        .unwrap();
        let pattern = dir.path().join("*.csv");

        let batches: Vec<_> = BatchReader::open(pattern.to_str().unwrap(), 2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            batches,
            vec![
                Batch {
                    id: 1,
                    value: "Helsinki;15.0,London;9.0".to_string()
                },
                Batch {
                    id: 2,
                    value: "Lisbon;20.5".to_string()
                },
            ]
        );
    }

    #[test]
    fn comma_separated_fields_are_joined_with_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "Oslo,1.5\nRome,22\n").unwrap();
        let pattern = dir.path().join("a.csv");

        let batch = BatchReader::open(pattern.to_str().unwrap(), 10)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(batch.value, "Oslo;1.5,Rome;22");
    }

    #[test]
    fn batches_span_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "A;1\nB;2\nC;3\n").unwrap();
        fs::write(dir.path().join("b.csv"), "D;4\n").unwrap();
        let pattern = dir.path().join("*.csv");

        let values: Vec<_> = BatchReader::open(pattern.to_str().unwrap(), 2)
            .unwrap()
            .map(|batch| batch.unwrap().value)
            .collect();
        assert_eq!(values, vec!["A;1,B;2", "C;3,D;4"]);
    }

    #[test]
    fn payload_carries_the_batch_body() {
        let payload = Batch {
            id: 9,
            value: "Helsinki;15.0".to_string(),
        }
        .into_payload();

        assert_eq!(payload, Payload::new(1, 1, "origin", "Helsinki;15.0"));
    }

    #[test]
    fn no_matching_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.csv");
        assert!(BatchReader::open(pattern.to_str().unwrap(), 5).is_err());
    }

    #[test]
    fn zero_batch_size_is_an_error() {
        assert!(BatchReader::open("*.csv", 0).is_err());
    }
}
