//! Bitsler-compatible provably-fair roll derivation.
//!
//! The algorithm is byte-exact with the reference:
//!
//! 1. `message = client_seed + "," + decimal(nonce)` (UTF-8)
//! 2. `H = HMAC-SHA512(key = server_seed, msg = message)` as lowercase hex
//! 3. Walk `H` in non-overlapping 5-hex-char windows; the first window whose
//!    integer value is <= 999_999 is the extracted number
//! 4. `roll = (number % 10_000) / 100.0`, two decimal digits
//!
//! If no window qualifies the oracle fails with
//! [`EngineError::OracleExhausted`]; there is no fallback path that could
//! bias the distribution.
//!
//! Seed lifecycle: within one epoch the nonce increments by exactly one per
//! consumed roll. Rotation reveals the previous epoch's server seed (kept in
//! the verifiable history) and resets the nonce to zero. Each oracle owns
//! its RNG so parallel workers can never alias fresh server seeds.

use crate::core::errors::EngineError;
use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

type HmacSha512 = Hmac<Sha512>;

/// Largest window value accepted by the extraction walk.
const MAX_WINDOW_VALUE: u32 = 999_999;

/// A seed epoch: server seed, client seed and the next nonce to consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPair {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
}

impl SeedPair {
    /// SHA-256 commitment to the server seed, publishable before any roll.
    pub fn server_seed_hash(&self) -> String {
        hex::encode(Sha256::digest(self.server_seed.as_bytes()))
    }
}

/// Public view of the current epoch: the hash commitment, never the seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedInfo {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// The dice oracle. Not thread-safe; each engine owns exactly one.
pub struct ProvablyFair {
    current: SeedPair,
    /// Revealed past epochs, oldest first
    history: Vec<SeedPair>,
    rng: StdRng,
}

impl ProvablyFair {
    /// Create an oracle with the given seeds, generating any that are
    /// missing from the OS entropy source.
    pub fn new(server_seed: Option<String>, client_seed: Option<String>) -> Self {
        let mut rng = StdRng::from_entropy();
        let current = SeedPair {
            server_seed: server_seed.unwrap_or_else(|| random_hex(&mut rng, 32)),
            client_seed: client_seed.unwrap_or_else(|| random_hex(&mut rng, 16)),
            nonce: 0,
        };
        Self {
            current,
            history: Vec::new(),
            rng,
        }
    }

    /// Deterministic construction for reproducible simulations: both the
    /// initial seeds and every future rotation derive from `rng_seed`.
    pub fn deterministic(rng_seed: u64, client_seed: impl Into<String>) -> Self {
        let mut rng = StdRng::seed_from_u64(rng_seed);
        let current = SeedPair {
            server_seed: random_hex(&mut rng, 32),
            client_seed: client_seed.into(),
            nonce: 0,
        };
        Self {
            current,
            history: Vec::new(),
            rng,
        }
    }

    /// Replace the client seed within the current epoch. Does not reset the
    /// nonce.
    pub fn set_client_seed(&mut self, client_seed: &str) -> Result<(), EngineError> {
        let trimmed = client_seed.trim();
        if trimmed.is_empty() {
            return Err(EngineError::config(
                "client_seed",
                "client seed cannot be empty",
            ));
        }
        self.current.client_seed = trimmed.to_string();
        Ok(())
    }

    /// Start a new epoch. Returns the previous epoch, whose server seed is
    /// now revealed; the nonce resets to zero and the client seed carries
    /// over.
    pub fn rotate_seeds(&mut self) -> SeedPair {
        let old = self.current.clone();
        self.history.push(old.clone());
        self.current = SeedPair {
            server_seed: random_hex(&mut self.rng, 32),
            client_seed: self.current.client_seed.clone(),
            nonce: 0,
        };
        old
    }

    /// Consume the current nonce and derive a roll.
    pub fn next_roll(&mut self) -> Result<f64, EngineError> {
        let roll = roll_value(
            &self.current.server_seed,
            &self.current.client_seed,
            self.current.nonce,
        )?;
        self.current.nonce += 1;
        Ok(roll)
    }

    /// Public info about the live epoch.
    pub fn current_info(&self) -> SeedInfo {
        SeedInfo {
            server_seed_hash: self.current.server_seed_hash(),
            client_seed: self.current.client_seed.clone(),
            nonce: self.current.nonce,
        }
    }

    /// Next nonce that would be consumed.
    pub fn nonce(&self) -> u64 {
        self.current.nonce
    }

    /// Revealed epochs, oldest first.
    pub fn verifiable_history(&self) -> &[SeedPair] {
        &self.history
    }

    /// Look up a revealed epoch by its public hash.
    pub fn revealed_seed_for(&self, server_seed_hash: &str) -> Option<&SeedPair> {
        self.history
            .iter()
            .find(|pair| pair.server_seed_hash() == server_seed_hash)
    }
}

fn random_hex(rng: &mut StdRng, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// HMAC-SHA512 of `client_seed,nonce` keyed by the server seed, lowercase hex.
pub fn hmac_hex(server_seed: &str, client_seed: &str, nonce: u64) -> String {
    let message = format!("{client_seed},{nonce}");
    let mut mac = HmacSha512::new_from_slice(server_seed.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Walk the hex digest in 5-char windows and return the first value
/// <= 999_999, with the offset it was found at.
pub fn extract_number(hmac_hex: &str) -> Option<(u32, usize)> {
    let mut offset = 0;
    while offset + 5 <= hmac_hex.len() {
        let window = &hmac_hex[offset..offset + 5];
        if let Ok(value) = u32::from_str_radix(window, 16) {
            if value <= MAX_WINDOW_VALUE {
                return Some((value, offset));
            }
        }
        offset += 5;
    }
    None
}

/// Derive the roll for an explicit seed triple.
pub fn roll_value(server_seed: &str, client_seed: &str, nonce: u64) -> Result<f64, EngineError> {
    let digest = hmac_hex(server_seed, client_seed, nonce);
    match extract_number(&digest) {
        Some((number, _)) => Ok(f64::from(number % 10_000) / 100.0),
        None => Err(EngineError::OracleExhausted {
            hmac: digest,
            nonce,
        }),
    }
}

/// Full verification record for one past roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    pub expected_roll: f64,
    pub computed_roll: f64,
    pub extracted_number: u32,
    pub message: String,
    pub hmac_sha512: String,
}

/// Recompute a roll from a revealed server seed and compare it with the
/// expected value.
///
/// Equality is exact at hundredth resolution: rolls are quantised to 0.01
/// steps, so there is no legitimate source of tolerance.
pub fn verify_roll(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    expected_roll: f64,
) -> Result<Verification, EngineError> {
    let digest = hmac_hex(server_seed, client_seed, nonce);
    let (number, _) = extract_number(&digest).ok_or_else(|| EngineError::OracleExhausted {
        hmac: digest.clone(),
        nonce,
    })?;
    let computed = f64::from(number % 10_000) / 100.0;
    let valid = (computed * 100.0).round() as u32 == (expected_roll * 100.0).round() as u32;
    Ok(Verification {
        valid,
        expected_roll,
        computed_roll: computed,
        extracted_number: number,
        message: format!("{client_seed},{nonce}"),
        hmac_sha512: digest,
    })
}

/// Aggregate outcome of verifying a batch of past rolls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVerification {
    pub total: usize,
    pub valid: usize,
    pub invalid: Vec<Verification>,
}

/// Verify a list of `(server_seed, client_seed, nonce, expected_roll)`
/// tuples, collecting the failures in full.
pub fn batch_verify(
    entries: &[(String, String, u64, f64)],
) -> Result<BatchVerification, EngineError> {
    let mut valid = 0;
    let mut invalid = Vec::new();
    for (server, client, nonce, expected) in entries {
        let verification = verify_roll(server, client, *nonce, *expected)?;
        if verification.valid {
            valid += 1;
        } else {
            invalid.push(verification);
        }
    }
    Ok(BatchVerification {
        total: entries.len(),
        valid,
        invalid,
    })
}
