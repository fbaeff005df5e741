use std::{env, str::FromStr};

use tracing::warn;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Maximum nesting of compound values accepted by encoders and decoders.
    pub max_depth: usize,
    /// Reject class names that are not present in the type registry.
    pub strict_types: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_types: false,
        }
    }
}

impl CodecConfig {
    /// Reads `AMF_MAX_DEPTH` and `AMF_STRICT_TYPES`, keeping defaults for unset or
    /// unparsable variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_depth: read_env("AMF_MAX_DEPTH").unwrap_or(default.max_depth),
            strict_types: read_env::<BoolFlag>("AMF_STRICT_TYPES")
                .map(|flag| flag.0)
                .unwrap_or(default.strict_types),
        }
    }
}

fn read_env<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Invalid value {value:?} of {name}, using default.");
            None
        }
    }
}

struct BoolFlag(bool);

impl FromStr for BoolFlag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "true" => Ok(BoolFlag(true)),
            "0" | "false" => Ok(BoolFlag(false)),
            _ => Err("invalid boolean flag"),
        }
    }
}

#[cfg(test)]
mod config_test {
    use super::*;

    #[test]
    fn bool_flag_test() {
        assert!("true".parse::<BoolFlag>().unwrap().0);
        assert!("1".parse::<BoolFlag>().unwrap().0);
        assert!(!"0".parse::<BoolFlag>().unwrap().0);
        assert!("yes".parse::<BoolFlag>().is_err());
    }

    #[test]
    fn default_config_is_permissive() {
        let config = CodecConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.strict_types);
    }
}
