//! Plugin parameter parsing
//!
//! protoc passes everything after `--rust-rpc_opt=` (or the `opt:` prefix of
//! `--rust-rpc_out=`) as a single comma separated string of `key=value` pairs.
//! This module turns that string into [`Options`].

use crate::GeneratorError;

/// Default crate path used for the RPC framework import
pub const DEFAULT_GRPC_PACKAGE: &str = "tonic";

/// Crate path used for the serialization runtime import
pub const RUNTIME_PACKAGE: &str = "prost";

/// Parsed plugin parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Selected RPC backend (`style=...`)
    pub style: String,
    /// Crate path bound to the RPC framework alias (`grpc_package=...`)
    pub grpc_package: String,
    /// Emit transport-backed constructors on clients (`transport=false` to omit)
    pub transport: bool,
}

impl Options {
    /// Parse the protoc parameter string.
    ///
    /// `style` is required. Unknown keys are ignored.
    pub fn parse(parameter: Option<&str>) -> Result<Self, GeneratorError> {
        let mut style = None;
        let mut grpc_package = None;
        let mut transport = true;

        for part in parameter
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                GeneratorError::InvalidConfig(format!("expected key=value, found `{}`", part))
            })?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(GeneratorError::InvalidConfig(format!(
                    "missing option name in `{}`",
                    part
                )));
            }

            match key {
                "style" => style = Some(value.to_string()),
                "grpc_package" => {
                    if value.is_empty() {
                        return Err(GeneratorError::InvalidConfig(
                            "grpc_package must not be empty".to_string(),
                        ));
                    }
                    grpc_package = Some(value.replace('-', "_"));
                }
                "transport" => transport = parse_bool(key, value)?,
                _ => tracing::debug!(key, value, "ignoring unknown option"),
            }
        }

        let style = style
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GeneratorError::InvalidConfig("missing required option `style`".to_string()))?;

        Ok(Options {
            style,
            grpc_package: grpc_package.unwrap_or_else(|| DEFAULT_GRPC_PACKAGE.to_string()),
            transport,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, GeneratorError> {
    match value {
        "true" | "" => Ok(true),
        "false" => Ok(false),
        other => Err(GeneratorError::InvalidConfig(format!(
            "option `{}` expects true or false, found `{}`",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_style_and_defaults() {
        let opts = Options::parse(Some("style=tonic")).unwrap();
        assert_eq!(opts.style, "tonic");
        assert_eq!(opts.grpc_package, DEFAULT_GRPC_PACKAGE);
        assert!(opts.transport);
    }

    #[test]
    fn test_parse_transport() {
        let opts = Options::parse(Some("style=tonic,transport=false")).unwrap();
        assert!(!opts.transport);
        assert!(Options::parse(Some("style=tonic,transport=maybe")).is_err());
    }

    #[test]
    fn test_parse_grpc_package_override() {
        let opts = Options::parse(Some("grpc_package=my-tonic, style=tonic")).unwrap();
        assert_eq!(opts.grpc_package, "my_tonic");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let opts = Options::parse(Some("style=messages,long_type=String,,")).unwrap();
        assert_eq!(opts.style, "messages");
    }

    #[test]
    fn test_missing_style() {
        assert!(matches!(
            Options::parse(None),
            Err(GeneratorError::InvalidConfig(_))
        ));
        assert!(matches!(
            Options::parse(Some("style=")),
            Err(GeneratorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_malformed_entry() {
        assert!(Options::parse(Some("style=tonic,verbose")).is_err());
        assert!(Options::parse(Some("=tonic")).is_err());
    }
}
