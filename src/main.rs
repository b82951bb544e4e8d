//! SIGIL demo node.
//!
//! Drives a minimal in-process inner chain through the proposer layer over
//! a sled-backed store: every interval it builds an inner block, wraps it
//! in a signed proposer header, verifies it, and accepts it.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sigil_core::codec::{ByteReader, ByteWriter};
use sigil_core::config::NodeConfig;
use sigil_core::consensus::{BlockStatus, ChainBlock, ChainVm};
use sigil_core::constants::MAX_ENVELOPE_SIZE;
use sigil_core::crypto::{hash_bytes, Hash, NodeId, StakingIdentity};
use sigil_core::errors::{ChainError, ChainResult};
use sigil_core::storage::SledDb;
use sigil_core::vm::{ProposerVm, RoundRobinWindow, SystemTimeSource, TimeSource};

/// Inner block of the demo chain: height, parent, timestamp, payload.
struct DemoBlock {
    height: u64,
    parent: Hash,
    timestamp: i64,
    payload: Vec<u8>,
    status: Mutex<BlockStatus>,
}

impl DemoBlock {
    fn new(height: u64, parent: Hash, timestamp: i64, payload: Vec<u8>) -> Self {
        DemoBlock {
            height,
            parent,
            timestamp,
            payload,
            status: Mutex::new(BlockStatus::Processing),
        }
    }

    fn encode(&self) -> ChainResult<Vec<u8>> {
        let mut w = ByteWriter::new(MAX_ENVELOPE_SIZE);
        w.write_u64(self.height)?;
        w.write_bytes(self.parent.as_bytes())?;
        w.write_i64(self.timestamp)?;
        w.write_bytes(&self.payload)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> ChainResult<Self> {
        let mut r = ByteReader::new(bytes);
        let height = r.read_u64()?;
        let parent: [u8; 32] = r.read_bytes()?.try_into().map_err(|_| {
            sigil_core::errors::ChainError::FailedParsing("bad demo parent id".into())
        })?;
        let timestamp = r.read_i64()?;
        let payload = r.read_bytes()?.to_vec();
        r.expect_done()?;
        Ok(DemoBlock::new(
            height,
            Hash::from_bytes(parent),
            timestamp,
            payload,
        ))
    }

    fn set_status(&self, status: BlockStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

impl ChainBlock for DemoBlock {
    fn id(&self) -> Hash {
        self.encode().map(|b| hash_bytes(&b)).unwrap_or_default()
    }

    fn bytes(&self) -> Vec<u8> {
        self.encode().unwrap_or_default()
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
        Ok(())
    }

    fn accept(&self) -> ChainResult<()> {
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

struct DemoChainVm;

impl ChainVm for DemoChainVm {
    fn parse_block(&self, bytes: &[u8]) -> ChainResult<Arc<dyn ChainBlock>> {
        Ok(Arc::new(DemoBlock::decode(bytes)?))
    }
}

fn main() -> ChainResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = Path::new("sigil.toml");
    let config = if config_path.exists() {
        NodeConfig::load(config_path)?
    } else {
        NodeConfig::default()
    };
    config.ensure_directories()?;

    let identity = StakingIdentity::load_or_generate(&config.identity_path, "sigil-node")?;
    let node_id = identity.node_id()?;
    info!(%node_id, "staking identity ready");

    // Proposer rotation from the config, with this node always a member.
    let mut proposers = Vec::with_capacity(config.proposers.len() + 1);
    for entry in &config.proposers {
        let proposer = NodeId::from_hex(entry)
            .map_err(|err| ChainError::Config(format!("bad proposer id {entry}: {err}")))?;
        proposers.push(proposer);
    }
    if !proposers.contains(&node_id) {
        proposers.push(node_id);
    }

    let db = Arc::new(SledDb::open(&config.data_dir.join("db"))?);
    let window = Arc::new(RoundRobinWindow::new(proposers));
    let vm = Arc::new(ProposerVm::new(
        Arc::new(DemoChainVm),
        window.clone(),
        Arc::new(SystemTimeSource),
        identity,
        db,
    ));

    let genesis_inner = DemoBlock::new(0, Hash::zero(), 0, b"sigil demo genesis".to_vec());
    let genesis = vm.initialize(&genesis_inner.bytes())?;
    info!(block = %genesis.id(), "chain initialized");

    let mut prev_inner_id = genesis.inner().id();
    let mut height = 0u64;

    loop {
        thread::sleep(Duration::from_millis(config.block_interval_ms));
        height += 1;
        window.set_height(height);

        let inner = Arc::new(DemoBlock::new(
            height,
            prev_inner_id,
            SystemTimeSource.now(),
            format!("payload {height}").into_bytes(),
        ));
        let next_inner_id = inner.id();

        let block = vm.build_block(inner)?;
        if let Err(err) = vm.verify_block(&block) {
            warn!(block = %block.id(), %err, "built block failed verification");
            vm.reject_block(&block)?;
            continue;
        }
        vm.accept_block(&block)?;
        prev_inner_id = next_inner_id;
    }
}
