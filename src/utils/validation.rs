use crate::utils::error::{LaunchError, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static REGION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-\d{1,2}$").ok());

// EKS cluster names: letter first, then letters, digits and hyphens, at most 100 chars
static CLUSTER_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,99}$").ok());

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "oci" => Ok(()),
            scheme => Err(LaunchError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u32, min_value: u32) -> Result<()> {
    if value < min_value {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_region(field_name: &str, region: &str) -> Result<()> {
    validate_pattern(
        field_name,
        region,
        &REGION_RE,
        "Expected an AWS region such as us-east-1",
    )
}

pub fn validate_cluster_name(field_name: &str, name: &str) -> Result<()> {
    validate_pattern(
        field_name,
        name,
        &CLUSTER_NAME_RE,
        "Must start with a letter and contain only letters, digits and hyphens (max 100)",
    )
}

fn validate_pattern(
    field_name: &str,
    value: &str,
    pattern: &LazyLock<Option<Regex>>,
    reason: &str,
) -> Result<()> {
    let Some(re) = &**pattern else {
        return Err(LaunchError::ConfigError {
            message: format!("validation pattern for {} failed to compile", field_name),
        });
    };

    if !re.is_match(value) {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(())
}
