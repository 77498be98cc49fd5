//! Random numeric strings for card numbers and security codes

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

const DIGITS: &[u8] = b"0123456789";

/// Samples fixed-length numeric strings from an injectable random source
pub struct CardNumberGenerator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl CardNumberGenerator {
    /// Generator seeded from the operating system
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self { rng: Mutex::new(Box::new(rng)) }
    }

    /// Draw `len` random decimal digits
    pub fn digits(&self, len: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..len)
            .map(|_| DIGITS[rng.gen_range(0..DIGITS.len())] as char)
            .collect()
    }
}

impl Default for CardNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
