/// Stream delivery and presence settings
use serde::{Deserialize, Serialize};

/// One day; presence entries never outlive this
pub const MAX_STREAM_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Base URL of the HLS origin/CDN, without trailing slash
    pub hls_base_url: String,
    /// Seconds a publish stays "live" without a refresh; also the presence TTL
    pub stream_timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            hls_base_url: "http://localhost:8080".to_string(),
            stream_timeout_secs: 60,
        }
    }
}

impl StreamingConfig {
    pub fn stream_timeout(&self) -> chrono::Duration {
        let secs = self.stream_timeout_secs.min(MAX_STREAM_TIMEOUT_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}
