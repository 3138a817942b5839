//! Small helpers shared by the registry client and the CLI.

/// Mask the value of every `api_key=` query parameter in `url`.
///
/// Used before any URL reaches a log line or an error message.
pub fn mask_api_key(url: &str) -> String {
    const PATTERN: &str = "api_key=";
    const REPLACEMENT: &str = "api_key=***";

    let mut result = url.to_string();
    let mut search_start = 0;
    while search_start < result.len() {
        let Some(start) = result[search_start..].find(PATTERN) else {
            break;
        };
        let abs_start = search_start + start;
        let value_start = abs_start + PATTERN.len();
        let value_end = result[value_start..]
            .find(['&', '#'])
            .map_or(result.len(), |idx| value_start + idx);

        result = format!(
            "{}{}{}",
            &result[..abs_start],
            REPLACEMENT,
            &result[value_end..]
        );
        search_start = abs_start + REPLACEMENT.len();
    }
    result
}

/// Show only the first four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if visible.len() == secret.len() {
        "***".to_string()
    } else {
        format!("{visible}***")
    }
}
