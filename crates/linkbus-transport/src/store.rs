use crate::error::Result;
use crate::traits::ConfigStore;

/// Length of a node's factory identity in bytes.
pub const UID_SIZE: usize = 12;

/// Config store backed by plain fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConfigStore {
    pub mode: u8,
    pub seed: u32,
    pub uid: [u8; UID_SIZE],
}

impl MemoryConfigStore {
    /// A store holding `uid`, truncated or zero padded to [`UID_SIZE`].
    pub fn with_uid(mode: u8, seed: u32, uid: &[u8]) -> Self {
        let mut buf = [0u8; UID_SIZE];
        let n = uid.len().min(UID_SIZE);
        buf[..n].copy_from_slice(&uid[..n]);
        Self {
            mode,
            seed,
            uid: buf,
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_mode(&mut self) -> Result<u8> {
        Ok(self.mode)
    }

    fn load_seed(&mut self) -> Result<u32> {
        Ok(self.seed)
    }

    fn load_uid(&mut self, uid: &mut [u8; UID_SIZE]) -> Result<()> {
        *uid = self.uid;
        Ok(())
    }
}
