/// Utility functions and helpers
use rand::Rng;
use std::time::Duration;

/// Generate an opaque 128-bit session token, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Pick a uniformly random delay in `[min_ms, max_ms]`
pub fn random_latency(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Sleep for an injected chaos delay, if bounds are configured
pub async fn inject_latency(bounds: Option<(u64, u64)>) {
    if let Some((min_ms, max_ms)) = bounds {
        let delay = random_latency(min_ms, max_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
