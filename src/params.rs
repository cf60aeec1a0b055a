//! `key=value;key=value` parameter strings.
//!
//! The host passes configuration changes as semicolon-separated pairs.
//! Unknown keys are carried along and ignored by the consumers.

use crate::HalError;

/// Output or input device mask, as a decimal integer.
pub const ROUTING: &str = "routing";
/// Device orientation: `landscape`, `portrait` or `square`.
pub const ORIENTATION: &str = "orientation";
/// Screen state: `on` or `off`.
pub const SCREEN_STATE: &str = "screen_state";
/// Value of [`SCREEN_STATE`] for a lit screen.
pub const VALUE_ON: &str = "on";
/// Value of [`SCREEN_STATE`] for a dark screen.
pub const VALUE_OFF: &str = "off";

/// A parsed parameter string.
///
/// # Example
///
/// ```
/// use audio_hal::params::Parameters;
///
/// let params = Parameters::parse("routing=2;screen_state=off");
/// assert_eq!(params.get("screen_state"), Some("off"));
/// assert_eq!(params.get_u32("routing").unwrap(), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pairs: Vec<(String, String)>,
}

impl Parameters {
    /// Parses `kvpairs`. Empty segments are skipped; a key without `=`
    /// gets an empty value.
    pub fn parse(kvpairs: &str) -> Self {
        let pairs = kvpairs
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
                None => (segment.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// Returns the value of the last occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of `key` parsed as an unsigned integer.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if the key is present but its value is
    /// not a decimal `u32`.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, HalError> {
        self.get(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| HalError::invalid(format!("{key}: '{value}' is not an integer")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let params = Parameters::parse("orientation=portrait;screen_state=on");
        assert_eq!(params.get(ORIENTATION), Some("portrait"));
        assert_eq!(params.get(SCREEN_STATE), Some(VALUE_ON));
        assert_eq!(params.get(ROUTING), None);
    }

    #[test]
    fn test_parse_tolerates_noise() {
        let params = Parameters::parse(" ;routing = 4;;flag; ");
        assert_eq!(params.get(ROUTING), Some("4"));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get(""), None);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let params = Parameters::parse("routing=1;routing=8");
        assert_eq!(params.get_u32(ROUTING).unwrap(), Some(8));
    }

    #[test]
    fn test_get_u32_rejects_garbage() {
        let params = Parameters::parse("routing=speaker");
        assert!(matches!(
            params.get_u32(ROUTING),
            Err(HalError::InvalidArgument { .. })
        ));
        assert_eq!(params.get_u32("missing").unwrap(), None);
    }
}
