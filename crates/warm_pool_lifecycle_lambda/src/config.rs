pub const ENFORCE_EVENT_PATTERN_VAR: &str = "ENFORCE_EVENT_PATTERN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Reject envelopes whose routing fields do not match the warm pool rule.
    pub enforce_event_pattern: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            enforce_event_pattern: true,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let enforce_event_pattern = match lookup(ENFORCE_EVENT_PATTERN_VAR) {
            Some(raw) => parse_flag(ENFORCE_EVENT_PATTERN_VAR, &raw)?,
            None => Self::default().enforce_event_pattern,
        };

        Ok(Self {
            enforce_event_pattern,
        })
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!(
            "{name} must be one of true, false, 1, 0 (got '{raw}')"
        )),
    }
}
