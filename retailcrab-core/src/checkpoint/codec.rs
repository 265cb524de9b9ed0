use super::*;

/// Leading bytes of every encoded checkpoint.
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"RCCK";

/// Bumped whenever the layout of [`Checkpoint`] changes.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = CHECKPOINT_MAGIC.len() + 4;

/// Encode as `magic | version (u32 LE) | bincode(checkpoint)`.
pub fn encode_checkpoint(checkpoint: &Checkpoint) -> Result<Vec<u8>, CheckpointError> {
    let body = bincode::serialize(checkpoint).map_err(CheckpointError::Encode)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&CHECKPOINT_MAGIC);
    bytes.extend_from_slice(&CHECKPOINT_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint, CheckpointError> {
    if bytes.len() < HEADER_LEN || bytes[..CHECKPOINT_MAGIC.len()] != CHECKPOINT_MAGIC {
        return Err(CheckpointError::Decode(Box::new(bincode::ErrorKind::Custom(
            "missing checkpoint header".to_string(),
        ))));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[CHECKPOINT_MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != CHECKPOINT_FORMAT_VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            found: version,
            expected: CHECKPOINT_FORMAT_VERSION,
        });
    }
    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(CheckpointError::Decode)
}
