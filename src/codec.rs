//! Message codec: JSON text over the broker's byte transport.
//!
//! Payloads cross the broker boundary as encoded JSON text. Receiving is
//! deliberately forgiving: bytes that are not valid JSON degrade to a raw
//! string payload so a malformed message is delivered rather than dropped.

use crate::error::{Result, SubmuxError};
use crate::types::MessageEncoding;
use serde::Serialize;
use serde_json::Value;

/// Encodes payloads to wire bytes and decodes received bytes back to values.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageCodec {
    encoding: MessageEncoding,
}

impl MessageCodec {
    /// Create a codec with the given text encoding.
    pub fn new(encoding: MessageEncoding) -> Self {
        Self { encoding }
    }

    /// The configured text encoding.
    pub fn encoding(&self) -> MessageEncoding {
        self.encoding
    }

    /// Encode a payload as JSON text in the configured encoding.
    pub fn encode<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>> {
        let text =
            serde_json::to_string(payload).map_err(|e| SubmuxError::Encode(e.to_string()))?;
        Ok(self.text_to_bytes(&text))
    }

    /// The encoded `{}` placeholder, sent when a payload cannot be serialized.
    pub fn placeholder(&self) -> Vec<u8> {
        self.text_to_bytes("{}")
    }

    /// Decode received bytes into a payload value.
    ///
    /// Invalid text sequences are replaced rather than rejected, and text
    /// that is not valid JSON is delivered as a raw string payload.
    pub fn decode(&self, raw: &[u8]) -> Value {
        let text = self.bytes_to_text(raw);
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "message is not valid JSON, delivering raw string");
                Value::String(text)
            }
        }
    }

    /// Decode received bytes, surfacing malformed JSON as an error instead
    /// of falling back to a raw string.
    pub fn decode_strict(&self, raw: &[u8]) -> Result<Value> {
        let text = self.bytes_to_text(raw);
        serde_json::from_str(&text).map_err(|e| SubmuxError::Decode(e.to_string()))
    }

    fn text_to_bytes(&self, text: &str) -> Vec<u8> {
        match self.encoding {
            MessageEncoding::Utf8 => text.as_bytes().to_vec(),
            MessageEncoding::Utf16Le => text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
        }
    }

    fn bytes_to_text(&self, raw: &[u8]) -> String {
        match self.encoding {
            MessageEncoding::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            MessageEncoding::Utf16Le => {
                // A trailing odd byte cannot form a code unit; it is dropped
                // by the lossy conversion.
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}
