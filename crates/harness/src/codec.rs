use modemsms_core::segment::{self, Encoding};
use modemsms_engine::{CodecError, PduCodec};
use modemsms_storage::Pdu;

/// Emits one placeholder PDU per planned segment.
#[derive(Debug, Default, Clone)]
pub struct FakeCodec {
    fail: bool,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl PduCodec for FakeCodec {
    fn encode(&self, recipient: &str, text: &str, encoding: Encoding) -> Result<Vec<Pdu>, CodecError> {
        if self.fail {
            return Err(CodecError(format!("refusing to encode for {recipient}")));
        }
        let plan = segment::plan(text, encoding);
        Ok((1..=plan.segment_count)
            .map(|i| Pdu {
                hex: format!("0011{:02X}{:02X}", i, plan.segment_count),
                tpdu_len: 3,
            })
            .collect())
    }
}
