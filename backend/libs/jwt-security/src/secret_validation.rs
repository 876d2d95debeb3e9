//! Signing secret strength checks
//!
//! HS256 secrets are only as strong as their entropy. A missing secret is a hard
//! configuration error; a short or low-entropy one is accepted with a warning.

/// 256 bits
pub const MIN_SECRET_LENGTH: usize = 32;
const RECOMMENDED_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS_PER_BYTE: f64 = 4.0;
const STRONG_ENTROPY_BITS_PER_BYTE: f64 = 5.0;
const MAX_RUN_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Shorter than 32 bytes, low entropy, or an obvious pattern
    Weak,
    Acceptable,
    Strong,
}

/// Measurements behind a [`SecretStrength`] verdict, handy for log fields.
#[derive(Debug, Clone, Copy)]
pub struct SecretAssessment {
    pub length: usize,
    pub entropy: f64,
    pub strength: SecretStrength,
}

pub fn assess_secret(secret: &str) -> SecretAssessment {
    let bytes = secret.as_bytes();
    let entropy = shannon_entropy(bytes);

    let strength = if bytes.len() < MIN_SECRET_LENGTH
        || entropy < MIN_ENTROPY_BITS_PER_BYTE
        || has_obvious_patterns(bytes)
    {
        SecretStrength::Weak
    } else if bytes.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= STRONG_ENTROPY_BITS_PER_BYTE
    {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    };

    SecretAssessment {
        length: bytes.len(),
        entropy,
        strength,
    }
}

pub fn validate_secret_strength(secret: &str) -> SecretStrength {
    assess_secret(secret).strength
}

/// Bits per byte, 0-8
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = f64::from(count) / len;
            -p * p.log2()
        })
        .sum()
}

/// Runs of repeated ("aaaa") or ascending ("abcd", "1234") bytes.
fn has_obvious_patterns(data: &[u8]) -> bool {
    let mut repeated = 1;
    let mut ascending = 1;

    for pair in data.windows(2) {
        repeated = if pair[0] == pair[1] { repeated + 1 } else { 1 };
        ascending = if i16::from(pair[1]) - i16::from(pair[0]) == 1 {
            ascending + 1
        } else {
            1
        };

        if repeated >= MAX_RUN_LENGTH || ascending >= MAX_RUN_LENGTH {
            return true;
        }
    }

    false
}
