use modemsms_core::segment::Encoding;
use modemsms_storage::Pdu;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Turns outgoing text into the PDUs handed to the modem. Character-set
/// conversion lives behind this trait.
pub trait PduCodec {
    fn encode(&self, recipient: &str, text: &str, encoding: Encoding) -> Result<Vec<Pdu>, CodecError>;
}
