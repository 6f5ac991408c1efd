//! Credential masking for human-readable output.

/// Mask an API key for display, keeping the first and last four characters.
/// Short keys are fully masked so the output never narrows a brute-force
/// search.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}
