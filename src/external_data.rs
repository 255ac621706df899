use log::debug;
use prost::bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::proto_adapter::{is_external, tensor_name};
use crate::{Error, GraphProto, Result, StringStringEntryProto, TensorProto};

/// Metadata for external tensor data
#[derive(Debug, Clone)]
pub(crate) struct ExternalDataInfo {
    pub location: String,
    pub offset: Option<u64>,
    pub length: Option<u64>,
}

impl ExternalDataInfo {
    /// Parse external data info from key-value pairs
    pub fn from_key_value_pairs(pairs: &[StringStringEntryProto]) -> Result<Self> {
        let mut location: Option<String> = None;
        let mut offset: Option<u64> = None;
        let mut length: Option<u64> = None;

        for pair in pairs {
            let key = pair.key.as_deref().unwrap_or("");
            let value = pair.value.as_deref().unwrap_or("");

            match key {
                "location" => location = Some(value.to_string()),
                "offset" => offset = Some(parse_u64(key, value)?),
                "length" => length = Some(parse_u64(key, value)?),
                _ => {} // checksum and unknown keys are ignored
            }
        }

        let location = location.ok_or_else(|| {
            Error::InvalidModel("External data missing required 'location' field".to_string())
        })?;

        Ok(ExternalDataInfo {
            location,
            offset,
            length,
        })
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        Error::InvalidModel(format!(
            "External data '{}' is not an unsigned integer: '{}'",
            key, value
        ))
    })
}

/// Loads and caches external tensor data files for one model
pub(crate) struct ExternalDataLoader {
    model_dir: PathBuf,
    cache: RefCell<HashMap<String, Bytes>>,
}

impl ExternalDataLoader {
    /// Create a new external data loader for a given model directory
    pub(crate) fn new(model_dir: PathBuf) -> Self {
        ExternalDataLoader {
            model_dir,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Load tensor data from external file with optional offset and length
    ///
    /// The whole file is read into the cache on first access; later tensors
    /// referencing the same file slice the cached buffer.
    pub(crate) fn load_data(&self, info: &ExternalDataInfo) -> Result<Bytes> {
        {
            let cache = self.cache.borrow();
            if let Some(cached_data) = cache.get(&info.location) {
                return self.slice_data(cached_data, info);
            }
        }

        let file_path = self.resolve(&info.location)?;
        let file_data = self.load_file(&file_path)?;
        let slice = self.slice_data(&file_data, info)?;

        self.cache
            .borrow_mut()
            .insert(info.location.clone(), file_data);

        Ok(slice)
    }

    /// Resolve a location relative to the model directory, refusing to
    /// escape it
    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::InvalidModel(format!(
                "External data location '{}' must be relative to the model directory",
                location
            )));
        }
        Ok(self.model_dir.join(relative))
    }

    /// Load entire file into memory as Bytes
    fn load_file(&self, path: &Path) -> Result<Bytes> {
        let mut file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open external data file '{}': {}",
                    path.display(),
                    e
                ),
            ))
        })?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read external data file '{}': {}",
                    path.display(),
                    e
                ),
            ))
        })?;

        Ok(Bytes::from(buffer))
    }

    /// Extract a slice of data based on offset and length
    fn slice_data(&self, data: &Bytes, info: &ExternalDataInfo) -> Result<Bytes> {
        let start = usize::try_from(info.offset.unwrap_or(0))?;
        let end = match info.length {
            Some(len) => start.saturating_add(usize::try_from(len)?),
            None => data.len(),
        };

        if start > data.len() {
            return Err(Error::InvalidModel(format!(
                "External data offset {} exceeds file size {}",
                start,
                data.len()
            )));
        }

        if end > data.len() {
            return Err(Error::InvalidModel(format!(
                "External data range {}..{} exceeds file size {}",
                start,
                end,
                data.len()
            )));
        }

        Ok(data.slice(start..end))
    }

    /// Replace an external reference with inline raw_data
    fn inline(&self, tensor: &mut TensorProto) -> Result<bool> {
        if !is_external(tensor) {
            return Ok(false);
        }
        let info = ExternalDataInfo::from_key_value_pairs(&tensor.external_data)?;
        let data = self.load_data(&info)?;
        debug!(
            "inlined {} bytes of '{}' from {}",
            data.len(),
            tensor_name(tensor),
            info.location
        );
        tensor.raw_data = Some(data);
        tensor.external_data.clear();
        tensor.data_location = None;
        Ok(true)
    }
}

impl std::fmt::Debug for ExternalDataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalDataLoader")
            .field("model_dir", &self.model_dir)
            .field("cached_files", &self.cache.borrow().len())
            .finish()
    }
}

/// Inline every externally stored initializer and node-attribute tensor of
/// `graph`, returning how many tensors were loaded
pub(crate) fn inline_external_data(graph: &mut GraphProto, model_dir: &Path) -> Result<usize> {
    let loader = ExternalDataLoader::new(model_dir.to_path_buf());
    let mut inlined = 0usize;

    for tensor in &mut graph.initializer {
        inlined += usize::from(loader.inline(tensor)?);
    }

    for node in &mut graph.node {
        for attr in &mut node.attribute {
            for tensor in attr.t.iter_mut().chain(attr.tensors.iter_mut()) {
                inlined += usize::from(loader.inline(tensor)?);
            }
        }
    }

    Ok(inlined)
}
