//! Shared fixtures for the integration suites: a minimal inner chain,
//! controllable time and window oracles, and a fault-injecting store.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sigil_core::codec::{ByteReader, ByteWriter};
use sigil_core::consensus::{BlockStatus, ChainBlock, ChainVm, OracleBlock, ProposerBlock, ProposerHeader};
use sigil_core::constants::MAX_ENVELOPE_SIZE;
use sigil_core::crypto::{hash_bytes, Hash, NodeId, StakingIdentity};
use sigil_core::errors::{ChainError, ChainResult};
use sigil_core::storage::{Database, MemoryDb, WriteBatch};
use sigil_core::vm::{ProposerVm, SubmissionWindow, TimeSource};

/// Inner block for tests: height, parent, timestamp, payload, plus fault
/// switches for the verify/accept/reject paths.
pub struct TestBlock {
    pub height: u64,
    pub parent: Hash,
    pub timestamp: i64,
    pub payload: Vec<u8>,
    pub fail_verify: bool,
    pub fail_accept: bool,
    status: Mutex<BlockStatus>,
}

impl TestBlock {
    pub fn new(height: u64, parent: Hash, timestamp: i64, payload: &[u8]) -> Self {
        TestBlock {
            height,
            parent,
            timestamp,
            payload: payload.to_vec(),
            fail_verify: false,
            fail_accept: false,
            status: Mutex::new(BlockStatus::Processing),
        }
    }

    pub fn genesis() -> Self {
        Self::new(0, Hash::zero(), 0, b"test genesis")
    }

    pub fn failing_verify(mut self) -> Self {
        self.fail_verify = true;
        self
    }

    pub fn failing_accept(mut self) -> Self {
        self.fail_accept = true;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(MAX_ENVELOPE_SIZE);
        w.write_u64(self.height).unwrap();
        w.write_bytes(self.parent.as_bytes()).unwrap();
        w.write_i64(self.timestamp).unwrap();
        w.write_bytes(&self.payload).unwrap();
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> ChainResult<Self> {
        let mut r = ByteReader::new(bytes);
        let height = r.read_u64()?;
        let parent: [u8; 32] = r
            .read_bytes()?
            .try_into()
            .map_err(|_| ChainError::FailedParsing("bad test parent id".into()))?;
        let timestamp = r.read_i64()?;
        let payload = r.read_bytes()?.to_vec();
        r.expect_done()?;
        Ok(TestBlock::new(height, Hash::from_bytes(parent), timestamp, &payload))
    }

    fn set_status(&self, status: BlockStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

impl ChainBlock for TestBlock {
    fn id(&self) -> Hash {
        hash_bytes(&self.encode())
    }

    fn bytes(&self) -> Vec<u8> {
        self.encode()
    }

    fn parent_id(&self) -> Hash {
        self.parent
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn verify(&self) -> ChainResult<()> {
        if self.fail_verify {
            return Err(ChainError::InnerBlock("inner verification failed".into()));
        }
        Ok(())
    }

    fn accept(&self) -> ChainResult<()> {
        if self.fail_accept {
            return Err(ChainError::InnerBlock("inner accept failed".into()));
        }
        self.set_status(BlockStatus::Accepted);
        Ok(())
    }

    fn reject(&self) -> ChainResult<()> {
        self.set_status(BlockStatus::Rejected);
        Ok(())
    }

    fn status(&self) -> BlockStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Inner block that exposes the oracle capability with two fixed options.
pub struct TestOracleBlock {
    pub base: TestBlock,
    pub options: [Arc<dyn ChainBlock>; 2],
}

impl ChainBlock for TestOracleBlock {
    fn id(&self) -> Hash {
        self.base.id()
    }

    fn bytes(&self) -> Vec<u8> {
        self.base.bytes()
    }

    fn parent_id(&self) -> Hash {
        self.base.parent_id()
    }

    fn height(&self) -> u64 {
        self.base.height()
    }

    fn timestamp(&self) -> i64 {
        self.base.timestamp()
    }

    fn verify(&self) -> ChainResult<()> {
        self.base.verify()
    }

    fn accept(&self) -> ChainResult<()> {
        self.base.accept()
    }

    fn reject(&self) -> ChainResult<()> {
        self.base.reject()
    }

    fn status(&self) -> BlockStatus {
        self.base.status()
    }

    fn as_oracle(&self) -> Option<&dyn OracleBlock> {
        Some(self)
    }
}

impl OracleBlock for TestOracleBlock {
    fn options(&self) -> ChainResult<[Arc<dyn ChainBlock>; 2]> {
        Ok([self.options[0].clone(), self.options[1].clone()])
    }
}

/// Inner VM parsing the test-block format.
pub struct TestChainVm;

impl ChainVm for TestChainVm {
    fn parse_block(&self, bytes: &[u8]) -> ChainResult<Arc<dyn ChainBlock>> {
        Ok(Arc::new(TestBlock::decode(bytes)?))
    }
}

/// Clock pinned to a settable instant.
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        ManualClock {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Window oracle with a settable height and one delay for every proposer.
pub struct FixedWindow {
    height: AtomicU64,
    delay_secs: AtomicU64,
}

impl FixedWindow {
    pub fn new(height: u64, delay_secs: u64) -> Self {
        FixedWindow {
            height: AtomicU64::new(height),
            delay_secs: AtomicU64::new(delay_secs),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_delay_secs(&self, delay: u64) {
        self.delay_secs.store(delay, Ordering::SeqCst);
    }
}

impl SubmissionWindow for FixedWindow {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn submission_delay(&self, _ref_height: u64, _node: &NodeId) -> Duration {
        Duration::from_secs(self.delay_secs.load(Ordering::SeqCst))
    }
}

/// Store wrapper failing every batch write that touches a given key prefix.
pub struct FailingDb {
    inner: MemoryDb,
    fail_prefix: Vec<u8>,
}

impl FailingDb {
    pub fn new(fail_prefix: &[u8]) -> Self {
        FailingDb {
            inner: MemoryDb::new(),
            fail_prefix: fail_prefix.to_vec(),
        }
    }
}

impl Database for FailingDb {
    fn get(&self, key: &[u8]) -> ChainResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> ChainResult<()> {
        if key.starts_with(&self.fail_prefix) {
            return Err(ChainError::Storage("injected write failure".into()));
        }
        self.inner.put(key, value)
    }

    fn write_batch(&self, batch: WriteBatch) -> ChainResult<()> {
        let ops = batch.into_ops();
        if ops.iter().any(|(key, _)| key.starts_with(&self.fail_prefix)) {
            return Err(ChainError::Storage("injected batch failure".into()));
        }
        let mut forwarded = WriteBatch::new();
        for (key, value) in ops {
            forwarded.put(key, value);
        }
        self.inner.write_batch(forwarded)
    }
}

/// A facade over the test chain with controllable oracles, initialized at
/// genesis.
pub struct TestHarness {
    pub vm: Arc<ProposerVm>,
    pub clock: Arc<ManualClock>,
    pub window: Arc<FixedWindow>,
    pub identity_node: NodeId,
    pub genesis: Arc<ProposerBlock>,
}

/// Build a harness over the given backing store.
pub fn harness_with_db(db: Arc<dyn Database>, now: i64) -> TestHarness {
    let clock = Arc::new(ManualClock::new(now));
    let window = Arc::new(FixedWindow::new(u64::MAX / 2, 0));
    let identity = StakingIdentity::generate("harness-node").unwrap();
    let identity_node = identity.node_id().unwrap();
    let vm = Arc::new(ProposerVm::new(
        Arc::new(TestChainVm),
        window.clone(),
        clock.clone(),
        identity,
        db,
    ));
    let genesis = vm.initialize(&TestBlock::genesis().encode()).unwrap();
    TestHarness {
        vm,
        clock,
        window,
        identity_node,
        genesis,
    }
}

pub fn harness(now: i64) -> TestHarness {
    harness_with_db(Arc::new(MemoryDb::new()), now)
}

impl TestHarness {
    /// Sign and cache a block with an explicit header, bypassing the build
    /// path so tests control timestamp and reference height directly.
    pub fn wrap(
        &self,
        parent: &Arc<ProposerBlock>,
        inner: Arc<dyn ChainBlock>,
        timestamp: i64,
        ref_height: u64,
    ) -> Arc<ProposerBlock> {
        let header = ProposerHeader::new(
            parent.id(),
            timestamp,
            ref_height,
            self.vm.identity().cert().clone(),
        );
        let block =
            Arc::new(ProposerBlock::signed(header, inner, self.vm.identity()).unwrap());
        self.vm.state().cache(&block);
        block
    }

    /// A fresh inner block chained under the given decorated parent.
    pub fn inner_under(&self, parent: &Arc<ProposerBlock>, timestamp: i64) -> Arc<dyn ChainBlock> {
        Arc::new(TestBlock::new(
            parent.height() + 1,
            parent.inner().id(),
            timestamp,
            format!("payload {timestamp}").as_bytes(),
        ))
    }
}
