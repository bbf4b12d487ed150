use std::path::Path;

use linkbus_transport::{ConfigStore, Result, TransportError, UID_SIZE};
use serde::Deserialize;

use crate::exit::{io_error, json_error, CliResult};

/// A slave's persisted configuration as kept in a JSON file.
///
/// ```json
/// [{"mode": 2, "seed": 4660, "uid": "ABC123456789"}, {"mode": 1, "seed": 17}]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonConfigStore {
    pub mode: u8,
    pub seed: u32,
    #[serde(default)]
    pub uid: String,
}

impl JsonConfigStore {
    /// Read one store per slave from a JSON array.
    pub fn load_all(path: &Path) -> CliResult<Vec<Self>> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
        serde_json::from_str(&text)
            .map_err(|err| json_error(&format!("invalid slave config {}", path.display()), err))
    }
}

impl ConfigStore for JsonConfigStore {
    fn load_mode(&mut self) -> Result<u8> {
        Ok(self.mode)
    }

    fn load_seed(&mut self) -> Result<u32> {
        Ok(self.seed)
    }

    /// Shorter identities are zero padded.
    fn load_uid(&mut self, uid: &mut [u8; UID_SIZE]) -> Result<()> {
        let bytes = self.uid.as_bytes();
        if bytes.len() > UID_SIZE {
            return Err(TransportError::StoreRead {
                field: "uid",
                reason: format!("{} bytes, at most {UID_SIZE} fit", bytes.len()),
            });
        }
        uid.fill(0);
        uid[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
