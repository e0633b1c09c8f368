//! Snappy (de)compression for HTTP request/response bodies.

use prost::Message;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("snappy decompress failed: {0}")]
    Decompress(#[from] snap::Error),
    #[error("protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Decompresses a snappy-framed body and decodes it as `T`.
pub fn decode<T: Message + Default>(body: &[u8]) -> Result<T, WireError> {
    let mut decoder = snap::raw::Decoder::new();
    let raw = decoder.decompress_vec(body)?;
    let msg = T::decode(raw.as_slice())?;
    Ok(msg)
}

/// Encodes `T` to protobuf, then snappy-compresses the result.
pub fn encode<T: Message>(msg: &T) -> Vec<u8> {
    let raw = msg.encode_to_vec();
    let mut encoder = snap::raw::Encoder::new();
    encoder
        .compress_vec(&raw)
        .expect("snappy compression of an in-memory buffer cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Label, TimeSeries, WriteRequest};

    #[test]
    fn round_trips_through_snappy_and_protobuf() {
        let req = WriteRequest {
            timeseries: vec![TimeSeries {
                labels: vec![Label {
                    name: "__name__".into(),
                    value: "up".into(),
                }],
                samples: vec![],
            }],
        };
        let wire = encode(&req);
        let decoded: WriteRequest = decode(&wire).unwrap();
        assert_eq!(req, decoded);
    }
}
