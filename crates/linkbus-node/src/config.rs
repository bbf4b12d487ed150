use heapless::Vec;
use linkbus_transport::{ConfigStore, UID_SIZE};

use crate::error::ConfigError;

/// Operation mode persisted with a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveMode {
    NoConfig,
    /// Joins the bus; the master names it after its address.
    NoUid,
    /// Joins the bus under its factory identity.
    HasUid,
}

impl SlaveMode {
    pub fn from_byte(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::NoConfig),
            1 => Some(Self::NoUid),
            2 => Some(Self::HasUid),
            _ => None,
        }
    }
}

/// A slave's persisted configuration, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveConfig {
    pub mode: SlaveMode,
    pub seed: u32,
    /// Identity without its zero padding; empty in [`SlaveMode::NoUid`].
    pub uid: Vec<u8, UID_SIZE>,
}

impl SlaveConfig {
    /// Read and validate the configuration. Any error means the node must
    /// not join the bus.
    pub fn load(store: &mut impl ConfigStore) -> Result<Self, ConfigError> {
        let raw_mode = store.load_mode()?;
        let mode = match SlaveMode::from_byte(raw_mode) {
            Some(SlaveMode::NoConfig) | None => return Err(ConfigError::Mode(raw_mode)),
            Some(mode) => mode,
        };

        let seed = store.load_seed()?;
        if seed == 0 {
            return Err(ConfigError::Seed);
        }

        let mut uid = Vec::new();
        if mode == SlaveMode::HasUid {
            let mut raw = [0u8; UID_SIZE];
            store.load_uid(&mut raw)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(UID_SIZE);
            if end == 0 {
                return Err(ConfigError::Uid);
            }
            uid = Vec::from_slice(&raw[..end]).map_err(|()| ConfigError::Uid)?;
        }

        Ok(Self { mode, seed, uid })
    }
}
