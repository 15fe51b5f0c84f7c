//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ipsync_core::{GlobalStat, IpDelta, IpRecord, Snapshot};

/// An IPv4 address from a small pool, so generated deltas collide with
/// generated records often.
pub fn ip() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|host| format!("192.168.1.{}", host + 10))
}

/// A non-negative rate in Mbps.
pub fn rate() -> impl Strategy<Value = f64> {
    0.0f64..1000.0
}

pub fn hostname() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

pub fn mac_address() -> impl Strategy<Value = String> {
    any::<[u8; 6]>().prop_map(|bytes| {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    })
}

pub fn bandwidth_limit() -> impl Strategy<Value = String> {
    (1u32..1000).prop_map(|mbit| format!("{}mbit", mbit))
}

/// A fully populated record.
pub fn record() -> impl Strategy<Value = IpRecord> {
    (
        ip(),
        rate(),
        rate(),
        prop::option::of(hostname()),
        prop::option::of(mac_address()),
        prop::option::of(bandwidth_limit()),
    )
        .prop_map(|(ip, down, up, host, mac, limit)| {
            let mut record = IpRecord::new(ip).with_download_rate(down).with_upload_rate(up);
            record.hostname = host;
            record.mac_address = mac;
            if let Some(limit) = limit {
                record = record.with_bandwidth_limit(limit);
            }
            record
        })
}

/// A sparse delta: `ip` plus any subset of the other fields.
pub fn delta() -> impl Strategy<Value = IpDelta> {
    (
        ip(),
        prop::option::of(rate()),
        prop::option::of(rate()),
        prop::option::of(hostname()),
        prop::option::of(bandwidth_limit()),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(ip, down, up, host, limit, limited)| {
            let mut delta = IpDelta::new(ip);
            delta.download_rate_mbps = down;
            delta.upload_rate_mbps = up;
            delta.hostname = host;
            delta.bandwidth_limit = limit;
            delta.is_limited = limited;
            delta
        })
}

/// A snapshot with up to `max_ips` records and a sequence below `max_seq`.
pub fn snapshot(max_ips: usize, max_seq: u64) -> impl Strategy<Value = Snapshot> {
    (prop::collection::vec(record(), 0..=max_ips), 0..max_seq)
        .prop_map(|(ips, sequence)| Snapshot::new(ips, sequence, "2024-01-01T00:00:00Z"))
}

pub fn global_stat() -> impl Strategy<Value = GlobalStat> {
    (prop::option::of(rate()), prop::option::of(0u64..256)).prop_map(|(wan_down, active)| {
        GlobalStat {
            wan_download_rate_mbps: wan_down,
            total_active_ips: active,
            ..GlobalStat::default()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_deltas_validate(delta in delta()) {
            prop_assert!(delta.validate().is_ok());
        }

        #[test]
        fn generated_records_validate(record in record()) {
            prop_assert!(record.validate().is_ok());
        }

        #[test]
        fn generated_mac_has_six_octets(mac in mac_address()) {
            prop_assert_eq!(mac.split(':').count(), 6);
        }
    }
}
