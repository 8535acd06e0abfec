use crate::error::Result;
use crate::nn::Module;
use crate::tensor::{RawTensor, Tensor};
use bincode::{Decode, Encode, config};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

pub type StateDict = BTreeMap<String, TensorData>;

/// Serializable representation of tensor data
#[derive(Encode, Decode, Clone, Debug, PartialEq)]
pub struct TensorData {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorData {
    pub fn from_tensor(t: &Tensor) -> Self {
        let borrowed = t.borrow();
        TensorData {
            data: borrowed.data.clone(),
            shape: borrowed.shape.clone(),
        }
    }

    pub fn to_tensor(&self, requires_grad: bool) -> Tensor {
        RawTensor::new(self.data.clone(), &self.shape, requires_grad)
    }

    /// Overwrite `t` in place, keeping its gradient-tracking flag
    pub fn copy_into(&self, t: &Tensor) {
        let mut b = t.borrow_mut();
        b.data = self.data.clone();
        b.shape = self.shape.clone();
        b.grad = None;
    }
}

/// Summary of differences between two state dicts.
///
/// `expected` usually comes from `model.state_dict()`, `loaded` from disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateDictDiff {
    /// Keys that exist in `expected` but are missing from `loaded`.
    pub missing_keys: Vec<String>,
    /// Keys that exist in `loaded` but not in `expected`.
    pub unexpected_keys: Vec<String>,
    /// `(key, expected_shape, loaded_shape)` for keys present in both.
    pub shape_mismatches: Vec<(String, Vec<usize>, Vec<usize>)>,
}

impl StateDictDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_keys.is_empty()
            && self.unexpected_keys.is_empty()
            && self.shape_mismatches.is_empty()
    }
}

/// Compute a diff between an "expected" and a "loaded" state dict.
pub fn diff_state_dict(expected: &StateDict, loaded: &StateDict) -> StateDictDiff {
    let mut diff = StateDictDiff::default();

    for (key, expected_td) in expected {
        match loaded.get(key) {
            None => diff.missing_keys.push(key.clone()),
            Some(actual_td) if expected_td.shape != actual_td.shape => {
                diff.shape_mismatches.push((
                    key.clone(),
                    expected_td.shape.clone(),
                    actual_td.shape.clone(),
                ));
            }
            Some(_) => {}
        }
    }

    diff.unexpected_keys = loaded
        .keys()
        .filter(|key| !expected.contains_key(*key))
        .cloned()
        .collect();

    diff
}

/// Load a state dict, skipping entries whose shape disagrees with the module,
/// and report what did not match.
pub fn load_state_dict_checked<M: Module + ?Sized>(module: &mut M, state: &StateDict) -> StateDictDiff {
    let expected = module.state_dict();
    let diff = diff_state_dict(&expected, state);
    let compatible: StateDict = state
        .iter()
        .filter(|(key, td)| expected.get(*key).is_some_and(|e| e.shape == td.shape))
        .map(|(key, td)| (key.clone(), td.clone()))
        .collect();
    module.load_state_dict(&compatible);
    diff
}

/// Insert `sub` into `state` under `prefix.`
pub(crate) fn insert_prefixed(state: &mut StateDict, prefix: &str, sub: StateDict) {
    for (key, value) in sub {
        state.insert(format!("{prefix}.{key}"), value);
    }
}

/// Entries of `state` under `prefix.`, with the prefix stripped
pub(crate) fn sub_state(state: &StateDict, prefix: &str) -> StateDict {
    let prefix = format!("{prefix}.");
    state
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.to_string(), value.clone()))
        })
        .collect()
}

fn write_encoded<T: Encode + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let encoded = bincode::encode_to_vec(value, config::standard())?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(&encoded)?;
    file.flush()?;
    debug!(path = %path.display(), bytes = encoded.len(), "wrote bincode file");
    Ok(())
}

fn read_encoded<T: Decode<()>>(path: &Path) -> Result<T> {
    let mut buffer = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut buffer)?;
    let (value, _) = bincode::decode_from_slice(&buffer, config::standard())?;
    Ok(value)
}

pub fn save_state_dict<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<()> {
    write_encoded(state, path.as_ref())
}

pub fn load_state_dict<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    read_encoded(path.as_ref())
}

/// Write the ordered per-epoch generator samples as one bincode file
pub fn save_samples<P: AsRef<Path>>(samples: &[TensorData], path: P) -> Result<()> {
    write_encoded(samples, path.as_ref())
}

pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<TensorData>> {
    read_encoded(path.as_ref())
}
