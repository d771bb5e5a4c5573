use bytes::Bytes;

/// An opaque message carried by the channel.
///
/// The channel serializes outbound messages with [`encode`] and rebuilds
/// inbound ones with [`decode`]; it never looks inside. A decode failure
/// is a soft error: the frame is dropped and the connection stays up.
///
/// [`encode`]: WireMessage::encode
/// [`decode`]: WireMessage::decode
pub trait WireMessage: Send + Sized + 'static {
    /// Error produced when a received payload does not parse.
    type DecodeError: std::error::Error + Send + Sync + 'static;

    /// Serialize this message to its raw byte form.
    fn encode(&self) -> Bytes;

    /// Rebuild a message from a complete received payload.
    fn decode(payload: &[u8]) -> std::result::Result<Self, Self::DecodeError>;
}

impl WireMessage for Bytes {
    type DecodeError = std::convert::Infallible;

    fn encode(&self) -> Bytes {
        self.clone()
    }

    fn decode(payload: &[u8]) -> std::result::Result<Self, Self::DecodeError> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

impl WireMessage for Vec<u8> {
    type DecodeError = std::convert::Infallible;

    fn decode(payload: &[u8]) -> std::result::Result<Self, Self::DecodeError> {
        Ok(payload.to_vec())
    }

    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}
