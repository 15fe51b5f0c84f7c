//! Inbound stream message types.
//!
//! The gateway multiplexes three kinds of JSON message over one stream,
//! discriminated by a `type` string. They are decoded into a tagged enum at
//! the transport boundary; nothing downstream inspects raw JSON.

use serde_json::Value;

use ipsync_core::{GlobalStat, IpDelta, Snapshot};

use crate::error::{Result, SyncError};

/// A decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"type":"snapshot","snapshot":{...}}`: full table replacement.
    Snapshot(Snapshot),
    /// `{"type":"ip","ip_stat":{...}}`: sparse single-IP update.
    Delta(IpDelta),
    /// `{"type":"global","global_stat":{...}}`: aggregate statistics.
    Global(GlobalStat),
    /// A well-formed message with a discriminator we do not handle.
    Unknown(String),
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// Fails on invalid JSON, a missing `type`, a missing or malformed body
    /// for a known type, or a delta that fails validation. Unrecognised
    /// types decode to [`InboundMessage::Unknown`].
    pub fn decode(text: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::InvalidMessage("missing type discriminator".into()))?
            .to_owned();

        match kind.as_str() {
            "snapshot" => {
                let body = take_body(&mut value, &kind, &["snapshot"])?;
                Ok(Self::Snapshot(serde_json::from_value(body)?))
            }
            "ip" => {
                let body = take_body(&mut value, &kind, &["ip_stat", "IPStat"])?;
                let delta: IpDelta = serde_json::from_value(body)?;
                delta.validate()?;
                Ok(Self::Delta(delta))
            }
            "global" => {
                let body = take_body(&mut value, &kind, &["global_stat", "GlobalStat"])?;
                Ok(Self::Global(serde_json::from_value(body)?))
            }
            _ => Ok(Self::Unknown(kind)),
        }
    }

    /// The wire discriminator of this message.
    pub fn kind(&self) -> &str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Delta(_) => "ip",
            Self::Global(_) => "global",
            Self::Unknown(kind) => kind,
        }
    }
}

fn take_body(value: &mut Value, kind: &str, keys: &[&str]) -> Result<Value> {
    keys.iter()
        .find_map(|key| {
            value
                .get_mut(*key)
                .filter(|body| !body.is_null())
                .map(Value::take)
        })
        .ok_or_else(|| SyncError::InvalidMessage(format!("{} message without {}", kind, keys[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_snapshot() {
        let msg = InboundMessage::decode(
            r#"{"type":"snapshot","snapshot":{"ips":[{"ip":"10.0.0.5","download_rate_mbps":1.0}],"sequence":5,"timestamp":"2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        match msg {
            InboundMessage::Snapshot(snap) => {
                assert_eq!(snap.sequence, 5);
                assert_eq!(snap.ips.len(), 1);
                assert_eq!(snap.ips[0].download_rate_mbps, 1.0);
                assert_eq!(snap.timestamp, "2024-01-01T00:00:00Z");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_delta_and_alias() {
        let msg =
            InboundMessage::decode(r#"{"type":"ip","ip_stat":{"ip":"10.0.0.5","download_rate_mbps":3.2}}"#)
                .unwrap();
        assert_eq!(
            msg,
            InboundMessage::Delta(IpDelta::new("10.0.0.5").download_rate(3.2))
        );

        let aliased =
            InboundMessage::decode(r#"{"type":"ip","IPStat":{"IP":"10.0.0.6","hostname":"nas"}}"#)
                .unwrap();
        assert_eq!(aliased, InboundMessage::Delta(IpDelta::new("10.0.0.6").hostname("nas")));
    }

    #[test]
    fn test_decode_global() {
        let msg = InboundMessage::decode(
            r#"{"type":"global","global_stat":{"wan_interface":"eth0","global_limit":"100mbit"}}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::Global(stat) => {
                assert_eq!(stat.wan_interface.as_deref(), Some("eth0"));
                assert_eq!(stat.global_limit.as_deref(), Some("100mbit"));
            }
            other => panic!("expected global, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = InboundMessage::decode(r#"{"type":"schedule","rule":{}}"#).unwrap();
        assert_eq!(msg, InboundMessage::Unknown("schedule".into()));
        assert_eq!(msg.kind(), "schedule");
    }

    #[test]
    fn test_malformed_messages_are_rejected() {
        assert!(matches!(InboundMessage::decode("not json"), Err(SyncError::Decode(_))));
        assert!(matches!(
            InboundMessage::decode(r#"{"snapshot":{"sequence":1}}"#),
            Err(SyncError::InvalidMessage(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"snapshot"}"#),
            Err(SyncError::InvalidMessage(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"snapshot","snapshot":null}"#),
            Err(SyncError::InvalidMessage(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"snapshot","snapshot":{"ips":[]}}"#),
            Err(SyncError::Decode(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"ip","ip_stat":{"download_rate_mbps":1.0}}"#),
            Err(SyncError::Decode(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"ip","ip_stat":{"ip":""}}"#),
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(InboundMessage::decode("[1,2,3]"), Err(SyncError::InvalidMessage(_))));
    }
}
