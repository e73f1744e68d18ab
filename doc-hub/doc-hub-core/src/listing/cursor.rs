use crate::error::AccessError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const PREFIX: &str = "offset:";

/// Opaque position in a pre-order listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub offset: usize,
}

impl Cursor {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{PREFIX}{}", self.offset))
    }

    pub fn decode(raw: &str) -> Result<Self, AccessError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|_| AccessError::InvalidCursor)?;
        let text = String::from_utf8(bytes).map_err(|_| AccessError::InvalidCursor)?;
        let offset = text
            .strip_prefix(PREFIX)
            .and_then(|n| n.parse().ok())
            .ok_or(AccessError::InvalidCursor)?;
        Ok(Self { offset })
    }
}
