pub mod fast_map;
mod wildcard;

pub use wildcard::wildcard_match;
