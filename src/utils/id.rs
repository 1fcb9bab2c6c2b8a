use std::sync::Arc;
use tinyrand::RandRange;
use tinyrand_std::thread_rand;

// Lowercase alphabet without the lookalikes (i/l/o and 0/1), so ids stay
// readable in log lines.
const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Short random id for ephemeral connections. Session and message ids are
/// UUIDs; connection ids only need to be unique among live sockets.
pub fn mini_id(length: usize) -> Arc<str> {
    let mut rng = thread_rand();
    let id: String = (0..length)
        .map(|_| ALPHABET[rng.next_range(0..ALPHABET.len())] as char)
        .collect();
    Arc::from(id)
}
