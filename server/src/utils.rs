use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u64::MAX as u128) as u64
}

// Rate limiting is per host, the source port is ignored
pub fn client_identifier(addr: SocketAddr) -> String {
    addr.ip().to_string()
}
