//! Property-based tests for the envelope codec and block identities.
//!
//! These verify the structural invariants hold under arbitrary field
//! values, not just the hand-picked cases in the scenario suites.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::TestBlock;
use sigil_core::consensus::{ChainBlock, ProposerBlock, ProposerHeader};
use sigil_core::crypto::{hash_bytes, Hash, ProposerCert, StakingIdentity};

fn arb_hash() -> impl Strategy<Value = Hash> {
    any::<[u8; 32]>().prop_map(Hash::from_bytes)
}

proptest! {
    /// Envelope round-trip: unmarshal(marshal(header, inner)) reproduces
    /// both, including the empty-certificate genesis shape, and
    /// re-marshalling the decoded header reproduces the input bytes.
    #[test]
    fn prop_envelope_roundtrip(
        parent in arb_hash(),
        timestamp in any::<i64>(),
        ref_height in any::<u64>(),
        inner in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let header = ProposerHeader::new(parent, timestamp, ref_height, ProposerCert::empty());
        let bytes = header.envelope(&inner).unwrap();
        let (decoded, decoded_inner) = ProposerHeader::unmarshal(&bytes).unwrap();
        prop_assert_eq!(&decoded, &header);
        prop_assert_eq!(&decoded_inner, &inner);
        prop_assert_eq!(decoded.envelope(&decoded_inner).unwrap(), bytes);
    }
}

/// Round-trip of a fully populated header: certificate plus signature, as
/// produced by the signing path.
#[test]
fn signed_envelope_roundtrips() {
    let identity = StakingIdentity::generate("roundtrip-node").unwrap();
    let inner: Arc<dyn ChainBlock> = Arc::new(TestBlock::new(1, Hash::zero(), 11, b"payload"));
    let header = ProposerHeader::new(hash_bytes(b"parent"), 11, 4, identity.cert().clone());
    let block = ProposerBlock::signed(header, inner, &identity).unwrap();

    let (decoded, decoded_inner) = ProposerHeader::unmarshal(block.bytes()).unwrap();
    assert_eq!(decoded.cert(), block.header().cert());
    assert_eq!(decoded.signature(), block.header().signature());
    assert_eq!(decoded.envelope(&decoded_inner).unwrap(), block.bytes());
}

proptest! {
    /// A decorated block's id is always the SHA-256 of its envelope bytes.
    #[test]
    fn prop_block_id_is_hash_of_bytes(
        parent in arb_hash(),
        timestamp in 0i64..2_000_000_000,
        ref_height in any::<u64>(),
        payload in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let inner: Arc<dyn ChainBlock> =
            Arc::new(TestBlock::new(1, Hash::zero(), timestamp, &payload));
        let header = ProposerHeader::new(parent, timestamp, ref_height, ProposerCert::empty());
        let block = ProposerBlock::from_parts(header, inner, None).unwrap();
        prop_assert_eq!(block.id(), hash_bytes(block.bytes()));
    }
}

proptest! {
    /// Truncating an envelope at any point fails parsing; it never panics
    /// or yields a block.
    #[test]
    fn prop_truncated_envelope_never_parses(
        parent in arb_hash(),
        timestamp in any::<i64>(),
        ref_height in any::<u64>(),
        inner in proptest::collection::vec(any::<u8>(), 0..64),
        cut_ratio in 0.0f64..1.0,
    ) {
        let header = ProposerHeader::new(parent, timestamp, ref_height, ProposerCert::empty());
        let bytes = header.envelope(&inner).unwrap();
        let cut = ((bytes.len() as f64) * cut_ratio) as usize;
        if cut < bytes.len() {
            prop_assert!(ProposerHeader::unmarshal(&bytes[..cut]).is_err());
        }
    }
}

#[test]
fn signing_twice_yields_identical_blocks() {
    let identity = StakingIdentity::generate("prop-node").unwrap();
    let inner: Arc<dyn ChainBlock> = Arc::new(TestBlock::new(1, Hash::zero(), 7, b"payload"));
    let header = ProposerHeader::new(hash_bytes(b"parent"), 7, 3, identity.cert().clone());

    let a = ProposerBlock::signed(header.clone(), inner.clone(), &identity).unwrap();
    let b = ProposerBlock::signed(header, inner, &identity).unwrap();
    assert_eq!(a.bytes(), b.bytes());
    assert_eq!(a.id(), b.id());
}
