// Lucky Draw Engine - Utility Functions
use chrono::Local;
use uuid::Uuid;

/// Mint a fresh identifier such as `p-3f2a...`
pub fn mint_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Placeholder avatar for a newly added participant
pub fn default_avatar(seed: usize) -> String {
    format!("https://picsum.photos/seed/p{}/100/100", seed)
}

/// Wall-clock time of a draw, shared by every winner of that draw
pub fn draw_timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
