//! Connection profiles
//!
//! A profile names one S3-compatible endpoint together with the credentials
//! used to reach it. Profiles are read from the configuration file; bsync
//! never writes credentials on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

/// A named S3-compatible endpoint with credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    #[serde(default)]
    pub name: String,

    /// Endpoint URL; AWS is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID
    #[serde(default)]
    pub access_key: String,

    /// Secret access key
    #[serde(default)]
    pub secret_key: String,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
        }
    }

    /// Set a custom endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Whether requests should use path-style addressing
    pub fn force_path_style(&self) -> bool {
        self.bucket_lookup == "path" || (self.bucket_lookup == "auto" && self.endpoint.is_some())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Check that every required field is present and well formed
    ///
    /// `position` names the profile in errors when its `name` is itself missing.
    pub fn validate(&self, position: usize) -> Result<()> {
        let label = if self.name.is_empty() {
            format!("#{}", position + 1)
        } else {
            self.name.clone()
        };
        let missing = |field| Error::MissingField {
            profile: label.clone(),
            field,
        };

        if self.name.trim().is_empty() {
            return Err(missing("name"));
        }
        if self.access_key.trim().is_empty() {
            return Err(missing("access_key"));
        }
        if self.secret_key.trim().is_empty() {
            return Err(missing("secret_key"));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        match self.bucket_lookup.as_str() {
            "auto" | "path" | "dns" => Ok(()),
            other => Err(Error::Config(format!(
                "Profile '{label}' has invalid bucket_lookup '{other}' (expected auto, path or dns)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_new() {
        let profile = Profile::new("default", "access", "secret");
        assert_eq!(profile.name, "default");
        assert_eq!(profile.region, "us-east-1");
        assert_eq!(profile.bucket_lookup, "auto");
        assert!(profile.endpoint.is_none());
        assert!(profile.validate(0).is_ok());
    }

    #[test]
    fn test_force_path_style() {
        let aws = Profile::new("aws", "a", "b");
        assert!(!aws.force_path_style());

        let local = Profile::new("local", "a", "b").with_endpoint("http://localhost:9000");
        assert!(local.force_path_style());

        let mut dns = local.clone();
        dns.bucket_lookup = "dns".to_string();
        assert!(!dns.force_path_style());
    }

    #[test]
    fn test_validate_missing_secret() {
        let profile = Profile::new("prod", "access", "");
        let err = profile.validate(0).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                field: "secret_key",
                ..
            }
        ));
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn test_validate_missing_name_uses_position() {
        let profile = Profile::new("", "a", "b");
        let err = profile.validate(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Profile '#3' is missing required field 'name'"
        );
    }

    #[test]
    fn test_validate_bad_endpoint() {
        let profile = Profile::new("x", "a", "b").with_endpoint("not a url");
        assert!(matches!(profile.validate(0), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_bad_lookup() {
        let mut profile = Profile::new("x", "a", "b");
        profile.bucket_lookup = "virtual".to_string();
        assert!(matches!(profile.validate(0), Err(Error::Config(_))));
    }
}
