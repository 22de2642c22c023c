//! Process configuration, read once at startup

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use mime::Mime;
use thiserror::Error;
use url::Url;

use crate::worker::{FailurePolicy, SinkKind};

const MIB: usize = 1024 * 1024;

/// Smallest part size S3 accepts for all but the last part
const MIN_PART_SIZE_MIB: usize = 5;
/// Largest part size S3 accepts (5 GiB)
const MAX_PART_SIZE_MIB: usize = 5 * 1024;
const DEFAULT_PART_SIZE_MIB: usize = 10;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const MAX_RETRY_BACKOFF_MS: u64 = 30_000;
const DEFAULT_PORT: u16 = 8080;

/// Errors raised while reading the configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A variable is set to something unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Cloudflare R2
    Production,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    fn parse(value: Option<String>) -> Result<Self, ConfigError> {
        let env = value
            .unwrap_or_else(|| "production".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            _ => Err(ConfigError::InvalidVar {
                name: "APP_ENV",
                reason: format!("unknown environment '{env}'"),
            }),
        }
    }

    /// Returns the endpoint URL to use instead of the account endpoint
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            Self::Production => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// Signing region for the object store
    #[must_use]
    pub const fn region(&self) -> &'static str {
        match self {
            Self::Production => "auto",
            Self::Development => "us-east-1",
        }
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Secret value that never shows up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Returns the secret value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Immutable process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment
    pub environment: Environment,
    /// Directory watched for new files
    pub watch_path: PathBuf,
    /// Public base URL of the bucket
    pub bucket_domain: String,
    /// Bucket name
    pub bucket_name: String,
    /// Storage account identifier
    pub account_id: String,
    /// Access key id
    pub access_key_id: String,
    /// Access key secret
    pub access_key_secret: Secret,
    /// Multipart part size in bytes
    pub part_size: usize,
    /// What to do when an upload fails
    pub failure_policy: FailurePolicy,
    /// Where published URLs go
    pub sink: SinkKind,
    /// Additions to the extension fallback table
    pub extra_mime_types: Vec<(String, Mime)>,
    /// Control surface port
    pub port: u16,
}

impl Config {
    /// Reads the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or any value is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`
    ///
    /// Values are trimmed and blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or any value is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let watch_path = PathBuf::from(required("CLOUDSHARE_WATCH_PATH")?);
        let bucket_domain = parse_domain(&required("R2_BUCKET_DOMAIN")?)?;
        let bucket_name = required("R2_BUCKET_NAME")?;
        let account_id = required("R2_ACCOUNT_ID")?;
        let access_key_id = required("R2_ACCESS_KEY_ID")?;
        let access_key_secret = Secret(required("R2_ACCESS_KEY_SECRET")?);

        let environment = Environment::parse(get("APP_ENV"))?;

        let part_size_mib: usize =
            parse_or("CLOUDSHARE_PART_SIZE_MIB", get("CLOUDSHARE_PART_SIZE_MIB"), DEFAULT_PART_SIZE_MIB)?;
        let part_size = parse_part_size(part_size_mib)?;

        let failure_policy = parse_failure_policy(
            get("CLOUDSHARE_FAILURE_POLICY"),
            parse_or("CLOUDSHARE_RETRY_ATTEMPTS", get("CLOUDSHARE_RETRY_ATTEMPTS"), DEFAULT_RETRY_ATTEMPTS)?,
            parse_or("CLOUDSHARE_RETRY_BACKOFF_MS", get("CLOUDSHARE_RETRY_BACKOFF_MS"), DEFAULT_RETRY_BACKOFF_MS)?,
        )?;

        let sink = get("CLOUDSHARE_SINK")
            .map(|value| {
                SinkKind::from_str(&value).map_err(|_| ConfigError::InvalidVar {
                    name: "CLOUDSHARE_SINK",
                    reason: format!("unknown sink '{value}', expected 'desktop' or 'log'"),
                })
            })
            .transpose()?
            .unwrap_or_default();

        let extra_mime_types = get("CLOUDSHARE_EXTRA_MIME_TYPES")
            .map(|value| parse_mime_table(&value))
            .transpose()?
            .unwrap_or_default();

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        Ok(Self {
            environment,
            watch_path,
            bucket_domain,
            bucket_name,
            account_id,
            access_key_id,
            access_key_secret,
            part_size,
            failure_policy,
            sink,
            extra_mime_types,
            port,
        })
    }

    /// Endpoint of the object store
    #[must_use]
    pub fn storage_endpoint(&self) -> String {
        self.environment.override_aws_endpoint_url().map_or_else(
            || format!("https://{}.r2.cloudflarestorage.com", self.account_id),
            ToString::to_string,
        )
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        // Per attempt, so that one slow part does not starve a large upload
        let timeout_config = TimeoutConfig::builder()
            .operation_attempt_timeout(Duration::from_secs(120))
            .build();

        let credentials = Credentials::new(
            &self.access_key_id,
            self.access_key_secret.expose(),
            None,
            None,
            "cloudshare",
        );

        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.environment.region()))
            .endpoint_url(self.storage_endpoint())
            .credentials_provider(credentials)
            .retry_config(retry_config)
            .timeout_config(timeout_config)
            .load()
            .await
    }

    /// AWS S3 service configuration
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self.environment, Environment::Development) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |value| {
        value.parse().map_err(|_| ConfigError::InvalidVar {
            name,
            reason: format!("'{value}' is not a valid number"),
        })
    })
}

/// Part size in bytes for a size given in MiB
fn parse_part_size(part_size_mib: usize) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidVar {
        name: "CLOUDSHARE_PART_SIZE_MIB",
        reason,
    };

    if !(MIN_PART_SIZE_MIB..=MAX_PART_SIZE_MIB).contains(&part_size_mib) {
        return Err(invalid(format!(
            "must be between {MIN_PART_SIZE_MIB} and {MAX_PART_SIZE_MIB}"
        )));
    }

    part_size_mib
        .checked_mul(MIB)
        .ok_or_else(|| invalid(format!("{part_size_mib} MiB does not fit in memory")))
}

fn parse_domain(value: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidVar {
        name: "R2_BUCKET_DOMAIN",
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(format!("'{value}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("'{value}' must be an http(s) URL")));
    }

    Ok(value.trim_end_matches('/').to_string())
}

fn parse_failure_policy(
    value: Option<String>,
    max_attempts: u32,
    backoff_ms: u64,
) -> Result<FailurePolicy, ConfigError> {
    let Some(value) = value else {
        return Ok(FailurePolicy::default());
    };

    match value.to_lowercase().as_str() {
        "stop" => Ok(FailurePolicy::Stop),
        "skip" => Ok(FailurePolicy::Skip),
        "retry" if max_attempts == 0 => Err(ConfigError::InvalidVar {
            name: "CLOUDSHARE_RETRY_ATTEMPTS",
            reason: "must be at least 1".to_string(),
        }),
        "retry" => Ok(FailurePolicy::Retry {
            max_attempts,
            initial_backoff: Duration::from_millis(backoff_ms),
            max_backoff: Duration::from_millis(MAX_RETRY_BACKOFF_MS.max(backoff_ms)),
        }),
        _ => Err(ConfigError::InvalidVar {
            name: "CLOUDSHARE_FAILURE_POLICY",
            reason: format!("unknown policy '{value}', expected 'stop', 'skip' or 'retry'"),
        }),
    }
}

/// Parses `ext=type,ext=type`
fn parse_mime_table(value: &str) -> Result<Vec<(String, Mime)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = |reason: String| ConfigError::InvalidVar {
                name: "CLOUDSHARE_EXTRA_MIME_TYPES",
                reason,
            };
            let (extension, mime_type) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{entry}' is not ext=type")))?;
            let mime_type = mime_type
                .trim()
                .parse::<Mime>()
                .map_err(|e| invalid(format!("'{mime_type}' is not a MIME type: {e}")))?;
            Ok((extension.trim().to_string(), mime_type))
        })
        .collect()
}
