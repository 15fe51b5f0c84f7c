//! Aggregate gateway statistics.
//!
//! These are forwarded to observers as-is and never touch the IP table or
//! the sequence. Fields the gateway adds later survive in `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lan_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wan_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lan_upload_rate_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lan_download_rate_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wan_upload_rate_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wan_download_rate_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_active_ips: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_limited_ips: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Any field not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
