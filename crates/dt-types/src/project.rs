//! Project: owns a wallet identity and an optional connection spec.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{ProjectId, SpecId};

/// A small BIP-39-flavored word list, enough entropy for a sandboxed wallet
/// that never touches a live chain.
const WORDLIST: &[&str] = &[
    "abandon", "ability", "able", "about", "above", "absent", "absorb", "abstract", "absurd",
    "abuse", "access", "accident", "account", "accuse", "achieve", "acid", "acoustic", "acquire",
    "across", "act", "action", "actor", "actress", "actual", "adapt", "add", "addict", "address",
    "adjust", "admit", "adult", "advance", "advice", "aerobic", "affair", "afford", "afraid",
    "again", "age", "agent", "agree", "ahead", "aim", "air", "airport", "aisle", "alarm", "album",
    "alcohol", "alert", "alien", "all", "alley", "allow", "almost", "alone", "alpha", "already",
    "also", "alter", "always", "amateur", "amazing", "among", "amount", "amused", "analyst",
];

const SEED_PHRASE_WORDS: usize = 12;

/// Wallet seed material, returned in plaintext exactly once at project
/// creation. Never stored alongside the `Project` record itself — see
/// `RecordStore::{put,get}_wallet_seed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletMaterial {
    pub seed_phrase: String,
    pub derived_address: String,
}

impl WalletMaterial {
    /// Generates a fresh seed phrase and its derived address. Not a real
    /// BIP-39/BIP-32 derivation — sandbox runs never touch a live chain.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let seed_phrase = (0..SEED_PHRASE_WORDS)
            .map(|_| *WORDLIST.choose(&mut rng).expect("wordlist is non-empty"))
            .collect::<Vec<_>>()
            .join(" ");
        let derived_address = derive_address(&seed_phrase);
        Self { seed_phrase, derived_address }
    }
}

/// Derives a sandbox wallet address as the first 20 bytes of the seed
/// phrase's SHA-256 digest, hex-encoded with a `0x` prefix.
fn derive_address(seed_phrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed_phrase.as_bytes());
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[..20]))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Address derived from the (never-again-exposed) seed material.
    pub wallet_address: String,
    /// Spec id of the most recent passing `connection`-type run, auto-set
    /// exactly once and cleared if that spec is deleted.
    pub connection_spec_id: Option<SpecId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(wallet_address: String) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            wallet_address,
            connection_spec_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a project with a freshly generated wallet identity. The
    /// returned `WalletMaterial` is the only time its seed phrase is ever
    /// available in plaintext — the caller must surface it to the operator
    /// now and persist it only through `RecordStore::put_wallet_seed`, never
    /// on the `Project` record itself.
    pub fn create() -> (Self, WalletMaterial) {
        let material = WalletMaterial::generate();
        (Self::new(material.derived_address.clone()), material)
    }

    /// Set `connection_spec_id` if unset. Auto-set happens exactly once;
    /// callers already know the passing run was `connection`-typed.
    pub fn set_connection_spec_once(&mut self, spec_id: SpecId) {
        if self.connection_spec_id.is_none() {
            self.connection_spec_id = Some(spec_id);
            self.updated_at = Utc::now();
        }
    }

    /// Clear the pointer when the referenced spec has been deleted.
    pub fn clear_connection_spec_if(&mut self, spec_id: SpecId) {
        if self.connection_spec_id == Some(spec_id) {
            self.connection_spec_id = None;
            self.updated_at = Utc::now();
        }
    }
}
