//! Short, human-typeable room codes.

use rand::Rng;
use tracing::error;

use crate::error::ChatError;

pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_LEN: usize = 6;

const RANDOM_ATTEMPTS: usize = 32;

/// Canonical form of user-typed codes: trimmed, uppercase.
pub fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: &'static [u8],
    len: usize,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_LEN)
    }
}

impl CodeGenerator {
    pub fn new(len: usize) -> Self {
        Self::with_alphabet(ALPHABET, len)
    }

    pub fn with_alphabet(alphabet: &'static [u8], len: usize) -> Self {
        Self { alphabet, len: len.max(1) }
    }

    /// Number of distinct codes, saturating at `u128::MAX`.
    pub fn space(&self) -> u128 {
        (self.alphabet.len() as u128)
            .checked_pow(self.len as u32)
            .unwrap_or(u128::MAX)
    }

    /// Produces a code for which `taken` is false.
    ///
    /// Random draws first; if those keep colliding the space is walked from a
    /// random offset, so the call only fails once every code is in use.
    pub fn generate<F>(&self, in_use: usize, taken: F) -> Result<String, ChatError>
    where
        F: Fn(&str) -> bool,
    {
        let space = self.space();
        if in_use as u128 >= space {
            return Err(self.exhausted(in_use));
        }

        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_ATTEMPTS {
            let code = self.random(&mut rng);
            if !taken(&code) {
                return Ok(code);
            }
        }

        let start = rng.gen_range(0..space);
        for step in 0..space {
            let code = self.nth((start + step) % space);
            if !taken(&code) {
                return Ok(code);
            }
        }
        Err(self.exhausted(in_use))
    }

    fn random(&self, rng: &mut impl Rng) -> String {
        (0..self.len)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())] as char)
            .collect()
    }

    fn nth(&self, mut n: u128) -> String {
        let base = self.alphabet.len() as u128;
        let mut out = vec![self.alphabet[0]; self.len];
        for slot in out.iter_mut().rev() {
            *slot = self.alphabet[(n % base) as usize];
            n /= base;
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn exhausted(&self, in_use: usize) -> ChatError {
        error!(in_use, len = self.len, "room code space exhausted");
        ChatError::Internal("room code space exhausted".into())
    }
}
