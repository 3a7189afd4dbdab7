use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::Record;

/// Collects final records per station and writes them as CSV, sorted by
/// station name.
#[derive(Debug, Default)]
pub struct StationWriter {
    stations: BTreeMap<String, Record>,
}

impl StationWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `data`, replacing any station seen before.
    pub fn process_data(&mut self, data: impl IntoIterator<Item = (String, Record)>) {
        self.stations.extend(data);
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn write_data(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("error creating file {}", path.display()))?;

        writer
            .write_record(["Station", "Min", "Max", "Avg"])
            .context("error writing header")?;
        for (name, record) in &self.stations {
            writer
                .write_record([
                    name.clone(),
                    format!("{:.2}", record.min),
                    format!("{:.2}", record.max),
                    format!("{:.2}", record.avg),
                ])
                .with_context(|| format!("error writing data for station {name}"))?;
        }
        writer.flush()?;
        Ok(())
    }
}
