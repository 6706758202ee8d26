//! Seed & key resource protection

use ccp_proto::{Resource, MAX_CRM_PAYLOAD};
use rand::Rng;

/// Longest seed a GET_SEED CRM carries after the protection status byte
pub const MAX_SEED_LEN: usize = MAX_CRM_PAYLOAD - 1;

/// Seed generation and key verification for GET_SEED / UNLOCK
pub trait SeedKey: Send + Sync {
    /// Fresh seed for unlocking `resource`, at most [`MAX_SEED_LEN`] bytes.
    /// Longer seeds make GET_SEED fail with RESOURCE_FUNCTION_NOT_AVAILABLE.
    fn seed(&self, resource: Resource) -> Vec<u8>;

    /// Whether `key` unlocks `resource` for `seed`
    fn verify(&self, resource: Resource, seed: &[u8], key: &[u8]) -> bool;
}

/// Reference algorithm: four random seed bytes, key = seed XOR shared secret
#[derive(Debug, Clone)]
pub struct XorSeedKey {
    secret: Vec<u8>,
}

impl XorSeedKey {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Key a master holding the secret derives from `seed`
    pub fn key_for(&self, seed: &[u8]) -> Vec<u8> {
        if self.secret.is_empty() {
            return seed.to_vec();
        }
        seed.iter()
            .enumerate()
            .map(|(i, b)| b ^ self.secret[i % self.secret.len()])
            .collect()
    }
}

impl SeedKey for XorSeedKey {
    fn seed(&self, _resource: Resource) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..4).map(|_| rng.gen()).collect()
    }

    fn verify(&self, _resource: Resource, seed: &[u8], key: &[u8]) -> bool {
        // Trailing bytes of a padded UNLOCK payload are ignored
        key.len() >= seed.len() && key[..seed.len()] == self.key_for(seed)[..]
    }
}
