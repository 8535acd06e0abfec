use crate::error::Result;
use crate::io::{self, TensorData};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Discriminator and generator loss at one logged batch (epoch and batch are 0-based)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub epoch: usize,
    pub batch: usize,
    pub d_loss: f32,
    pub g_loss: f32,
}

/// Append-only list of recorded losses, optionally mirrored to a CSV file
/// row by row as records arrive
#[derive(Default)]
pub struct LossHistory {
    records: Vec<LossRecord>,
    sink: Option<csv::Writer<File>>,
}

impl std::fmt::Debug for LossHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LossHistory")
            .field("records", &self.records.len())
            .field("csv_log", &self.sink.is_some())
            .finish()
    }
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that also writes every record to `path`, truncating it first
    pub fn with_csv_log<P: AsRef<Path>>(path: P) -> Result<Self> {
        let writer = csv::Writer::from_path(path.as_ref())?;
        info!(path = %path.as_ref().display(), "logging losses to csv");
        Ok(LossHistory {
            records: Vec::new(),
            sink: Some(writer),
        })
    }

    pub fn push(&mut self, record: LossRecord) -> Result<()> {
        if let Some(writer) = self.sink.as_mut() {
            writer.serialize(record)?;
            writer.flush()?;
        }
        self.records.push(record);
        Ok(())
    }

    /// Copy of the records without the CSV sink
    pub fn snapshot(&self) -> LossHistory {
        LossHistory {
            records: self.records.clone(),
            sink: None,
        }
    }

    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&LossRecord> {
        self.records.last()
    }

    /// Mean discriminator and generator loss over all records
    pub fn mean(&self) -> Option<(f32, f32)> {
        if self.records.is_empty() {
            return None;
        }
        let n = self.records.len() as f32;
        let (d, g) = self
            .records
            .iter()
            .fold((0.0, 0.0), |(d, g), r| (d + r.d_loss, g + r.g_loss));
        Some((d / n, g / n))
    }
}

/// Read back a CSV loss log
pub fn read_loss_log<P: AsRef<Path>>(path: P) -> Result<Vec<LossRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Generator output on the fixed latent batch, one entry per epoch
#[derive(Debug, Default, Clone)]
pub struct SampleHistory {
    samples: Vec<TensorData>,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, images: &Tensor) {
        self.samples.push(TensorData::from_tensor(images));
    }

    pub fn samples(&self) -> &[TensorData] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        io::save_samples(&self.samples, path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            epochs = self.samples.len(),
            "saved generator samples"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::RawTensor;

    fn record(batch: usize) -> LossRecord {
        LossRecord {
            epoch: 0,
            batch,
            d_loss: 1.25,
            g_loss: 0.5 + batch as f32,
        }
    }

    #[test]
    fn test_csv_log_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("losses.csv");
        let mut history = LossHistory::with_csv_log(&path).unwrap();
        history.push(record(0)).unwrap();
        history.push(record(50)).unwrap();

        // readable before the history is dropped
        let logged = read_loss_log(&path).unwrap();
        assert_eq!(logged, history.records());
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("epoch,batch,d_loss,g_loss"));
    }

    #[test]
    fn test_snapshot_leaves_sink_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("losses.csv");
        let mut history = LossHistory::with_csv_log(&path).unwrap();
        history.push(record(0)).unwrap();

        let copy = history.snapshot();
        history.push(record(1)).unwrap();

        assert_eq!(copy.records(), &[record(0)]);
        assert_eq!(read_loss_log(&path).unwrap(), vec![record(0), record(1)]);
    }

    #[test]
    fn test_mean() {
        let mut history = LossHistory::new();
        assert_eq!(history.mean(), None);
        history.push(record(0)).unwrap();
        history.push(record(2)).unwrap();
        assert_eq!(history.mean(), Some((1.25, 1.5)));
    }

    #[test]
    fn test_sample_history_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.bin");
        let mut history = SampleHistory::new();
        for epoch in 0..3 {
            history.push(&RawTensor::constant(epoch as f32 / 4.0, &[2, 3, 32, 32]));
        }
        history.save(&path).unwrap();

        let loaded = io::load_samples(&path).unwrap();
        assert_eq!(loaded, history.samples());
        assert_eq!(loaded[2].shape, vec![2, 3, 32, 32]);
    }
}
