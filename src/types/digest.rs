//! Content digests returned with sent and received messages.

use md5::{Digest, Md5};

use crate::types::{AttributeDataType, MessageAttributes};

/// MD5 of a message body, lowercase hex.
pub fn md5_of_body(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// MD5 of message attributes using the length-prefixed canonical encoding.
///
/// Attributes are visited in name order. Each contributes its name, data type,
/// a transport byte (1 for String/Number, 2 for Binary) and its value, every
/// variable-length field prefixed by a 4-byte big-endian length.
/// Returns `None` for an empty map.
pub fn md5_of_attributes(attributes: &MessageAttributes) -> Option<String> {
    if attributes.is_empty() {
        return None;
    }

    let mut buffer = Vec::new();
    for (name, value) in attributes {
        push_prefixed(&mut buffer, name.as_bytes());
        push_prefixed(&mut buffer, value.data_type.as_bytes());

        match value.base_type() {
            Some(AttributeDataType::Binary) => {
                buffer.push(2);
                push_prefixed(&mut buffer, value.binary_value.as_deref().unwrap_or_default());
            }
            _ => {
                buffer.push(1);
                push_prefixed(
                    &mut buffer,
                    value.string_value.as_deref().unwrap_or_default().as_bytes(),
                );
            }
        }
    }

    let mut hasher = Md5::new();
    hasher.update(&buffer);
    Some(format!("{:x}", hasher.finalize()))
}

fn push_prefixed(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(bytes);
}
