//! Execution core configuration.
//!
//! Configuration is usually embedded in the gateway's own YAML configuration and handed over
//! already parsed, but can also be loaded on its own with [`Configuration::from_yaml`].

use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// The configuration of the execution core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Compilation of backend operations.
    pub compiler: CompilerConfig,

    /// Per-field instrumentation.
    pub field_tracking: FieldTrackingConfig,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        compiler: Option<CompilerConfig>,
        field_tracking: Option<FieldTrackingConfig>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            compiler: compiler.unwrap_or_default(),
            field_tracking: field_tracking.unwrap_or_default(),
        };
        configuration.validate()
    }

    /// Parses and validates a configuration in YAML syntax.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let configuration: Self = serde_yaml::from_str(yaml)?;
        configuration.validate()
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        self.compiler.validate()?;
        Ok(self)
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Prefix of the names of extracted variables, which are numbered from zero after it.
    ///
    /// Defaults to `v`, giving `$v0`, `$v1` and so on.
    #[serde(default = "default_variable_prefix")]
    pub variable_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            variable_prefix: default_variable_prefix(),
        }
    }
}

impl CompilerConfig {
    /// The prefix must start a valid GraphQL name.
    fn validate(&self) -> Result<(), ConfigurationError> {
        let mut chars = self.variable_prefix.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
            && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
        if valid {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidValue {
                field: "compiler.variable_prefix",
                reason: format!(
                    "'{}' is not the start of a GraphQL name",
                    self.variable_prefix
                ),
            })
        }
    }
}

fn default_variable_prefix() -> String {
    String::from("v")
}

/// Field tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldTrackingConfig {
    /// Set to false to never notify field instrumentation.
    ///
    /// Defaults to true
    #[serde(default = "default_tracking_enabled")]
    pub enabled: bool,
}

impl Default for FieldTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: default_tracking_enabled(),
        }
    }
}

fn default_tracking_enabled() -> bool {
    true
}
