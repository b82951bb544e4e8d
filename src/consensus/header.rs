//! The proposer header and its deterministic envelope encoding.
//!
//! The envelope is the canonical byte form of a decorated block: the header
//! fields in fixed order followed by the wrapped inner-block bytes. It is
//! used verbatim on the wire and as the persisted value in the block store.

use crate::codec::{ByteReader, ByteWriter};
use crate::constants::{MAX_ENVELOPE_SIZE, PROPOSER_VERSION};
use crate::crypto::{Hash, ProposerCert};
use crate::errors::{ChainError, ChainResult};

/// Header prepended to every decorated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposerHeader {
    version: u16,
    parent_id: Hash,
    timestamp: i64,
    ref_height: u64,
    cert: ProposerCert,
    signature: Vec<u8>,
}

impl ProposerHeader {
    /// A header for a new proposal. The signature starts empty and is filled
    /// in by the signing step.
    pub fn new(parent_id: Hash, timestamp: i64, ref_height: u64, cert: ProposerCert) -> Self {
        ProposerHeader {
            version: PROPOSER_VERSION,
            parent_id,
            timestamp,
            ref_height,
            cert,
            signature: Vec::new(),
        }
    }

    /// The genesis header: zero parent, epoch timestamp, reference height 0,
    /// empty certificate, empty signature.
    pub fn genesis() -> Self {
        Self::new(Hash::zero(), 0, 0, ProposerCert::empty())
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn parent_id(&self) -> Hash {
        self.parent_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn ref_height(&self) -> u64 {
        self.ref_height
    }

    pub fn cert(&self) -> &ProposerCert {
        &self.cert
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub(crate) fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// Canonical envelope over this header and the wrapped inner bytes.
    pub fn envelope(&self, inner_bytes: &[u8]) -> ChainResult<Vec<u8>> {
        self.encode(inner_bytes, &self.signature)
    }

    /// Envelope with the signature field explicitly cleared.
    ///
    /// Signing and signature verification both hash exactly these bytes;
    /// neither ever operates on a representation that includes the
    /// signature.
    pub fn unsigned_envelope(&self, inner_bytes: &[u8]) -> ChainResult<Vec<u8>> {
        self.encode(inner_bytes, &[])
    }

    fn encode(&self, inner_bytes: &[u8], signature: &[u8]) -> ChainResult<Vec<u8>> {
        let mut w = ByteWriter::new(MAX_ENVELOPE_SIZE);
        w.write_u16(self.version)?;
        w.write_bytes(self.parent_id.as_bytes())?;
        w.write_i64(self.timestamp)?;
        w.write_u64(self.ref_height)?;
        w.write_bytes(self.cert.der())?;
        w.write_bytes(signature)?;
        w.write_bytes(inner_bytes)?;
        Ok(w.finish())
    }

    /// Decode an envelope into its header and the wrapped inner bytes.
    pub fn unmarshal(bytes: &[u8]) -> ChainResult<(Self, Vec<u8>)> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(ChainError::FailedParsing("envelope exceeds size cap".into()));
        }
        let mut r = ByteReader::new(bytes);
        let version = r.read_u16()?;

        let parent_bytes = r.read_bytes()?;
        let parent_id: [u8; 32] = parent_bytes
            .try_into()
            .map_err(|_| ChainError::FailedParsing("parent id must be 32 bytes".into()))?;

        let timestamp = r.read_i64()?;
        let ref_height = r.read_u64()?;
        let cert = ProposerCert::from_der(r.read_bytes()?.to_vec())?;
        let signature = r.read_bytes()?.to_vec();
        let inner_bytes = r.read_bytes()?.to_vec();
        r.expect_done()?;

        Ok((
            ProposerHeader {
                version,
                parent_id: Hash::from_bytes(parent_id),
                timestamp,
                ref_height,
                cert,
                signature,
            },
            inner_bytes,
        ))
    }
}
