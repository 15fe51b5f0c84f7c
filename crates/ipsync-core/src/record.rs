//! Per-IP records and the sparse deltas that update them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Status assigned to a record when the gateway does not report one.
pub const DEFAULT_STATUS: &str = "Active";

/// One entry per observed client IP.
///
/// The wire format uses snake_case keys. `IP` is accepted as an alias for
/// `ip`, and JSON `null` rates decode as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRecord {
    /// Client address; unique within a table.
    #[serde(alias = "IP")]
    pub ip: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Instantaneous download rate in Mbit/s.
    #[serde(default, deserialize_with = "zero_if_null")]
    pub download_rate_mbps: f64,

    /// Instantaneous upload rate in Mbit/s.
    #[serde(default, deserialize_with = "zero_if_null")]
    pub upload_rate_mbps: f64,

    /// Explicit per-IP cap. `None` means the global limit applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_limit: Option<String>,

    #[serde(default, deserialize_with = "false_if_null")]
    pub is_limited: bool,

    #[serde(default = "default_status", deserialize_with = "status_or_default")]
    pub status: String,
}

impl IpRecord {
    /// Create a record with zero rates and the default status.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac_address: None,
            hostname: None,
            download_rate_mbps: 0.0,
            upload_rate_mbps: 0.0,
            bandwidth_limit: None,
            is_limited: false,
            status: default_status(),
        }
    }

    /// Build a fresh record from a delta for an IP not yet in the table.
    pub fn from_delta(delta: &IpDelta) -> Self {
        let mut record = Self::new(delta.ip.clone());
        record.merge(delta);
        record
    }

    /// Merge a delta into this record, field by field.
    ///
    /// Present, non-empty fields overwrite. Missing fields and empty strings
    /// leave the existing value in place. The `ip` key never changes.
    pub fn merge(&mut self, delta: &IpDelta) {
        if let Some(mac) = non_empty(&delta.mac_address) {
            self.mac_address = Some(mac.to_owned());
        }
        if let Some(hostname) = non_empty(&delta.hostname) {
            self.hostname = Some(hostname.to_owned());
        }
        if let Some(rate) = delta.download_rate_mbps {
            self.download_rate_mbps = rate;
        }
        if let Some(rate) = delta.upload_rate_mbps {
            self.upload_rate_mbps = rate;
        }
        if let Some(limit) = non_empty(&delta.bandwidth_limit) {
            self.bandwidth_limit = Some(limit.to_owned());
        }
        if let Some(limited) = delta.is_limited {
            self.is_limited = limited;
        }
        if let Some(status) = non_empty(&delta.status) {
            self.status = status.to_owned();
        }
    }

    /// Check the record's structural invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_ip(&self.ip)?;
        validate_rate(&self.ip, "download_rate_mbps", self.download_rate_mbps)?;
        validate_rate(&self.ip, "upload_rate_mbps", self.upload_rate_mbps)
    }

    pub fn with_download_rate(mut self, mbps: f64) -> Self {
        self.download_rate_mbps = mbps;
        self
    }

    pub fn with_upload_rate(mut self, mbps: f64) -> Self {
        self.upload_rate_mbps = mbps;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(mac.into());
        self
    }

    pub fn with_bandwidth_limit(mut self, limit: impl Into<String>) -> Self {
        self.bandwidth_limit = Some(limit.into());
        self.is_limited = true;
        self
    }
}

/// A sparse single-IP update.
///
/// Only `ip` is mandatory. Deltas carry no sequence number of their own, so
/// two deltas for the same IP resolve last-write-wins in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpDelta {
    #[serde(alias = "IP")]
    pub ip: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_rate_mbps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_rate_mbps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_limited: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl IpDelta {
    /// Create an empty delta for `ip`.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    pub fn download_rate(mut self, mbps: f64) -> Self {
        self.download_rate_mbps = Some(mbps);
        self
    }

    pub fn upload_rate(mut self, mbps: f64) -> Self {
        self.upload_rate_mbps = Some(mbps);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(mac.into());
        self
    }

    pub fn bandwidth_limit(mut self, limit: impl Into<String>) -> Self {
        self.bandwidth_limit = Some(limit.into());
        self
    }

    pub fn limited(mut self, limited: bool) -> Self {
        self.is_limited = Some(limited);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Check that the delta names an IP and carries sane rates.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_ip(&self.ip)?;
        if let Some(rate) = self.download_rate_mbps {
            validate_rate(&self.ip, "download_rate_mbps", rate)?;
        }
        if let Some(rate) = self.upload_rate_mbps {
            validate_rate(&self.ip, "upload_rate_mbps", rate)?;
        }
        Ok(())
    }
}

fn validate_ip(ip: &str) -> Result<(), ValidationError> {
    if ip.trim().is_empty() {
        return Err(ValidationError::EmptyIp);
    }
    Ok(())
}

fn validate_rate(ip: &str, field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidRate {
            ip: ip.to_owned(),
            field,
            value,
        });
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn default_status() -> String {
    DEFAULT_STATUS.to_owned()
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn false_if_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn status_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_status))
}
