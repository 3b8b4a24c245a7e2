#![allow(dead_code)]

pub mod config;
pub mod mock_llm;
pub mod server;

/// Parse SSE `data:` payloads from raw response text
pub fn parse_sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.starts_with("data: "))
        .map(|line| line.trim_start_matches("data: ").to_owned())
        .collect()
}
