//! Proposer certificates and the node's staking identity.
//!
//! A proposer is identified by a self-signed X.509 certificate carried in
//! every block header. This deployment restricts certificates to Ed25519
//! subject keys; the node address is derived from the raw certificate DER.

use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use x509_parser::oid_registry::OID_SIG_ED25519;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::crypto::{hash_bytes, Hash, NodeId};
use crate::errors::{ChainError, ChainResult};

/// An X.509 proposer certificate, kept alongside its parsed Ed25519 key.
///
/// The empty certificate (zero-length DER) is a sentinel reserved for the
/// genesis block; it carries no key, cannot verify signatures, and has no
/// node id.
#[derive(Clone)]
pub struct ProposerCert {
    der: Vec<u8>,
    key: Option<VerifyingKey>,
}

impl ProposerCert {
    /// The empty certificate sentinel.
    pub fn empty() -> Self {
        ProposerCert {
            der: Vec::new(),
            key: None,
        }
    }

    /// Parse a certificate from raw DER bytes.
    ///
    /// Zero-length input yields the empty sentinel. Anything else must be a
    /// well-formed X.509 certificate with an Ed25519 subject key.
    pub fn from_der(der: Vec<u8>) -> ChainResult<Self> {
        if der.is_empty() {
            return Ok(Self::empty());
        }
        let (rem, cert) = X509Certificate::from_der(&der)
            .map_err(|err| ChainError::FailedParsing(format!("malformed certificate: {err}")))?;
        if !rem.is_empty() {
            return Err(ChainError::FailedParsing(
                "trailing bytes after certificate".into(),
            ));
        }
        let spki = cert.public_key();
        if spki.algorithm.algorithm != OID_SIG_ED25519 {
            return Err(ChainError::FailedParsing(format!(
                "unsupported certificate key algorithm {}",
                spki.algorithm.algorithm
            )));
        }
        let key_bytes: [u8; 32] = spki
            .subject_public_key
            .data
            .as_ref()
            .try_into()
            .map_err(|_| ChainError::FailedParsing("invalid certificate key length".into()))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|err| ChainError::FailedParsing(format!("invalid certificate key: {err}")))?;
        Ok(ProposerCert {
            der,
            key: Some(key),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }

    /// Raw DER bytes; empty for the genesis sentinel.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The certificate's Ed25519 subject key, if present.
    pub fn verifying_key(&self) -> Option<&VerifyingKey> {
        self.key.as_ref()
    }

    /// Derive the 20-byte node address: SHA-256 over the raw DER, truncated.
    pub fn node_id(&self) -> ChainResult<NodeId> {
        if self.der.is_empty() {
            return Err(ChainError::InvalidNodeId);
        }
        let digest = hash_bytes(&self.der);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest.as_bytes()[..20]);
        Ok(NodeId(addr))
    }

    /// Verify a signature over a 32-byte message digest.
    pub fn verify_digest(&self, digest: &Hash, signature: &[u8]) -> ChainResult<()> {
        let key = self.key.as_ref().ok_or(ChainError::InvalidSignature)?;
        let signature =
            Signature::from_slice(signature).map_err(|_| ChainError::InvalidSignature)?;
        key.verify(digest.as_bytes(), &signature)
            .map_err(|_| ChainError::InvalidSignature)
    }
}

impl PartialEq for ProposerCert {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ProposerCert {}

impl std::fmt::Debug for ProposerCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "ProposerCert(empty)")
        } else {
            write!(f, "ProposerCert({} bytes)", self.der.len())
        }
    }
}

/// On-disk identity encoding: hex DER plus hex PKCS#8 key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredIdentity {
    certificate: String,
    secret_key: String,
}

/// The node's staking identity: a proposer certificate and its signing key.
///
/// Only block signing reads the secret key.
pub struct StakingIdentity {
    cert: ProposerCert,
    key: SigningKey,
}

impl StakingIdentity {
    /// Generate a fresh self-signed identity.
    pub fn generate(common_name: &str) -> ChainResult<Self> {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519)
            .map_err(|err| ChainError::Crypto(format!("failed to generate staking key: {err}")))?;
        let params = rcgen::CertificateParams::new(vec![common_name.to_string()])
            .map_err(|err| ChainError::Crypto(format!("invalid certificate params: {err}")))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|err| ChainError::Crypto(format!("failed to self-sign: {err}")))?;
        let key = SigningKey::from_pkcs8_der(&key_pair.serialize_der())
            .map_err(|err| ChainError::Crypto(format!("unusable staking key: {err}")))?;
        Self::from_parts(ProposerCert::from_der(cert.der().to_vec())?, key)
    }

    /// Bind a certificate to a signing key, rejecting mismatched material.
    pub fn from_parts(cert: ProposerCert, key: SigningKey) -> ChainResult<Self> {
        match cert.verifying_key() {
            Some(vk) if *vk == key.verifying_key() => Ok(StakingIdentity { cert, key }),
            Some(_) => Err(ChainError::InvalidStakingKey(
                "certificate does not match signing key".into(),
            )),
            None => Err(ChainError::InvalidStakingKey(
                "certificate carries no signing-capable key".into(),
            )),
        }
    }

    pub fn cert(&self) -> &ProposerCert {
        &self.cert
    }

    pub fn node_id(&self) -> ChainResult<NodeId> {
        self.cert.node_id()
    }

    /// Sign a 32-byte message digest with the staking key.
    pub fn sign_digest(&self, digest: &Hash) -> Vec<u8> {
        self.key.sign(digest.as_bytes()).to_bytes().to_vec()
    }

    pub fn save(&self, path: &Path) -> ChainResult<()> {
        let stored = StoredIdentity {
            certificate: hex::encode(&self.cert.der),
            secret_key: hex::encode(self.key.to_bytes()),
        };
        let rendered = toml::to_string_pretty(&stored).map_err(|err| {
            ChainError::Config(format!("staking identity is not representable as TOML: {err}"))
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn load(path: &Path) -> ChainResult<Self> {
        let raw = fs::read_to_string(path)?;
        let stored: StoredIdentity = toml::from_str(&raw).map_err(|err| {
            ChainError::Config(format!(
                "malformed staking identity {}: {err}",
                path.display()
            ))
        })?;
        let der = hex::decode(&stored.certificate).map_err(|err| {
            ChainError::Config(format!("certificate in staking identity is not hex: {err}"))
        })?;
        let secret: [u8; 32] = hex::decode(&stored.secret_key)
            .map_err(|err| {
                ChainError::Config(format!("secret key in staking identity is not hex: {err}"))
            })?
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::Config("staking secret key must be 32 bytes".into()))?;
        Self::from_parts(ProposerCert::from_der(der)?, SigningKey::from_bytes(&secret))
    }

    pub fn load_or_generate(path: &Path, common_name: &str) -> ChainResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let identity = Self::generate(common_name)?;
        identity.save(path)?;
        Ok(identity)
    }
}

impl std::fmt::Debug for StakingIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StakingIdentity({:?}, key [REDACTED])", self.cert)
    }
}
