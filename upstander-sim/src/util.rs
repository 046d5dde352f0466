use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::hash::Hasher;
use twox_hash::XxHash64;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Independent seed for one `(persona, stream)` pair within a run.
///
/// Streams keep pacing, survey and policy randomness from shifting each
/// other when one of them draws more values.
pub fn stream_seed(run_seed: u64, persona_id: &str, stream: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(run_seed);
    hasher.write(stream.as_bytes());
    hasher.write_u8(0xFF);
    hasher.write(persona_id.as_bytes());
    hasher.finish()
}

pub fn stream_rng(run_seed: u64, persona_id: &str, stream: &str) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(stream_seed(run_seed, persona_id, stream))
}
