//! Server catalog filtering and selection.
//!
//! Filtering matches a free-text location mask against selected record
//! fields; selection turns the filtered set into exactly one record
//! (or an entry/exit pair for multi-hop).

use std::time::Duration;

use crate::catalog::{ServerRecord, ServersSnapshot};
use crate::constants;
use crate::logger::{self, LogLevel};
use crate::shell;
use crate::state::Protocol;

use super::ResolutionError;

/// Which record fields a location mask is matched against, plus the
/// protocol universe and inversion flag.
///
/// With no field flag set, the mask is matched against every field.
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    pub protocol: Option<Protocol>,
    /// Match against the gateway identifier.
    pub location: bool,
    pub city: bool,
    pub country: bool,
    pub country_code: bool,
    /// Complement the match set within the protocol-filtered universe.
    pub invert: bool,
}

impl FilterOptions {
    fn matches(&self, record: &ServerRecord, mask: &str) -> bool {
        let mask = mask.to_lowercase();
        let contains = |field: &str| field.to_lowercase().contains(&mask);

        let any_field_flag = self.location || self.city || self.country || self.country_code;
        if !any_field_flag {
            return contains(&record.gateway)
                || contains(&record.city)
                || contains(&record.country)
                || contains(&record.country_code);
        }

        (self.location && contains(&record.gateway))
            || (self.city && contains(&record.city))
            || (self.country && contains(&record.country))
            || (self.country_code && contains(&record.country_code))
    }
}

/// Filter the catalog by protocol and location mask, preserving
/// catalog order.
///
/// An empty mask matches every record of the protocol universe (and
/// with `invert` therefore matches none).
#[must_use]
pub fn filter_servers<'a>(
    snapshot: &'a ServersSnapshot,
    mask: &str,
    opts: &FilterOptions,
) -> Vec<&'a ServerRecord> {
    snapshot
        .all_servers()
        .filter(|record| match opts.protocol {
            Some(protocol) => record.supports(protocol),
            None => true,
        })
        .filter(|record| opts.matches(record, mask) != opts.invert)
        .collect()
}

/// Reduce a filtered candidate set to exactly one record.
///
/// # Errors
///
/// Returns [`ResolutionError::NotFound`] for an empty set and
/// [`ResolutionError::Ambiguous`] for more than one candidate unless
/// `any` is set, in which case the first record in catalog order wins.
pub fn select_single<'a>(
    candidates: &[&'a ServerRecord],
    any: bool,
) -> Result<&'a ServerRecord, ResolutionError> {
    match candidates {
        [] => Err(ResolutionError::NotFound),
        [single] => Ok(single),
        [first, ..] => {
            if any {
                logger::log(
                    LogLevel::Info,
                    "SELECT",
                    format!(
                        "{} servers matched; taking first found: {}",
                        candidates.len(),
                        first.gateway
                    ),
                );
                Ok(first)
            } else {
                Err(ResolutionError::Ambiguous(candidates.len()))
            }
        }
    }
}

/// Measures reachability latency of a server record.
///
/// Injectable so selection logic is testable without a network.
pub trait LatencyProber: Sync {
    /// Probe one record; `None` when the record is unreachable or the
    /// probe failed.
    fn probe(&self, record: &ServerRecord) -> Option<Duration>;
}

/// Latency probing via the system `ping` command against the record's
/// first endpoint address.
pub struct PingProber {
    pub timeout_secs: u64,
}

impl Default for PingProber {
    fn default() -> Self {
        Self {
            timeout_secs: constants::DEFAULT_PING_TIMEOUT,
        }
    }
}

impl PingProber {
    fn endpoint_addr(record: &ServerRecord) -> Option<&str> {
        record
            .hosts
            .first()
            .map(|h| h.host.as_str())
            .or_else(|| record.ip_addresses.first().map(String::as_str))
    }
}

impl LatencyProber for PingProber {
    fn probe(&self, record: &ServerRecord) -> Option<Duration> {
        let addr = Self::endpoint_addr(record)?;

        #[cfg(target_os = "macos")]
        let timeout_arg = (self.timeout_secs * 1000).to_string();
        #[cfg(not(target_os = "macos"))]
        let timeout_arg = self.timeout_secs.to_string();

        let output = shell::output("ping", &["-c", "1", "-W", &timeout_arg, addr])?;
        if !output.status.success() {
            return None;
        }

        // "round-trip min/avg/max/stddev = 23.2/23.2/23.2/0.0 ms"
        // or "rtt min/avg/max/mdev = 23.2/..." on Linux
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Some(values) = line.split(" = ").nth(1) {
                if let Some(avg) = values.split('/').nth(1) {
                    if let Ok(ms) = avg.trim().parse::<f64>() {
                        return Some(Duration::from_micros((ms * 1000.0) as u64));
                    }
                }
            }
        }
        None
    }
}

/// Select the fastest of the filtered candidates.
///
/// All candidates are probed concurrently with a bounded per-probe
/// timeout; unreachable candidates are excluded from the ranking. The
/// remaining servers are sorted by latency ascending and the lowest
/// latency wins.
///
/// # Errors
///
/// Returns [`ResolutionError::NotFound`] for an empty candidate set.
/// When no candidate yields a latency, falls back to the first record
/// in catalog order if `any` is set, otherwise returns
/// [`ResolutionError::ProbeFailed`].
pub fn select_fastest<'a>(
    candidates: &[&'a ServerRecord],
    any: bool,
    prober: &dyn LatencyProber,
) -> Result<&'a ServerRecord, ResolutionError> {
    if candidates.is_empty() {
        return Err(ResolutionError::NotFound);
    }
    if let [single] = candidates {
        return Ok(single);
    }

    let mut ranked: Vec<(&ServerRecord, Duration)> = std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .iter()
            .map(|record| scope.spawn(move || prober.probe(record).map(|lat| (*record, lat))))
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().ok().flatten())
            .collect()
    });

    if ranked.is_empty() {
        if any {
            logger::log(
                LogLevel::Warning,
                "SELECT",
                "No server responded to latency probes; taking first found",
            );
            return Ok(candidates[0]);
        }
        return Err(ResolutionError::ProbeFailed(
            "no server responded to latency probes".to_string(),
        ));
    }

    ranked.sort_by_key(|(_, latency)| *latency);
    let (fastest, latency) = ranked[0];
    logger::log(
        LogLevel::Info,
        "SELECT",
        format!("Fastest server: {} ({latency:?})", fastest.gateway),
    );
    Ok(fastest)
}

/// Resolve a server by exact gateway identifier among records
/// supporting `protocol`. Used for multi-hop entry/exit resolution,
/// where location filtering does not apply.
///
/// # Errors
///
/// Returns [`ResolutionError::NotFound`] when no record carries the
/// identifier and [`ResolutionError::Ambiguous`] when several do.
pub fn resolve_exact<'a>(
    snapshot: &'a ServersSnapshot,
    gateway: &str,
    protocol: Protocol,
) -> Result<&'a ServerRecord, ResolutionError> {
    let matches: Vec<&ServerRecord> = snapshot
        .all_servers()
        .filter(|record| record.supports(protocol))
        .filter(|record| record.gateway == gateway)
        .collect();

    match matches.as_slice() {
        [] => Err(ResolutionError::NotFound),
        [single] => Ok(single),
        _ => Err(ResolutionError::Ambiguous(matches.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogConfig, WgHost};

    fn record(gateway: &str, city: &str, country: &str, cc: &str, wg: bool) -> ServerRecord {
        ServerRecord {
            gateway: gateway.to_string(),
            city: city.to_string(),
            country: country.to_string(),
            country_code: cc.to_string(),
            hosts: if wg {
                vec![WgHost {
                    host: "10.0.0.1".to_string(),
                    public_key: "pk".to_string(),
                    local_ip: "172.16.0.1".to_string(),
                }]
            } else {
                Vec::new()
            },
            ip_addresses: if wg {
                Vec::new()
            } else {
                vec!["10.0.0.2".to_string()]
            },
        }
    }

    fn snapshot() -> ServersSnapshot {
        ServersSnapshot {
            wireguard_servers: vec![
                record("us-ny.wg", "New York", "United States", "US", true),
                record("us-chi.wg", "Chicago", "United States", "US", true),
                record("de-fra.wg", "Frankfurt", "Germany", "DE", true),
            ],
            openvpn_servers: vec![
                record("de-fra.ovpn", "Frankfurt", "Germany", "DE", false),
                record("de-ber.ovpn", "Berlin", "Germany", "DE", false),
                record("nl-ams.ovpn", "Amsterdam", "Netherlands", "NL", false),
            ],
            config: CatalogConfig::default(),
        }
    }

    struct FixedProber;

    impl LatencyProber for FixedProber {
        fn probe(&self, record: &ServerRecord) -> Option<Duration> {
            match record.gateway.as_str() {
                "us-ny.wg" => Some(Duration::from_millis(40)),
                "us-chi.wg" => Some(Duration::from_millis(15)),
                // de-fra.wg never responds
                _ => None,
            }
        }
    }

    struct DeadProber;

    impl LatencyProber for DeadProber {
        fn probe(&self, _record: &ServerRecord) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn test_filter_by_city() {
        let snapshot = snapshot();
        let opts = FilterOptions {
            city: true,
            ..FilterOptions::default()
        };
        let matched = filter_servers(&snapshot, "new york", &opts);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].gateway, "us-ny.wg");
    }

    #[test]
    fn test_filter_any_field_when_no_flag() {
        let snapshot = snapshot();
        let matched = filter_servers(&snapshot, "frankfurt", &FilterOptions::default());
        let gateways: Vec<&str> = matched.iter().map(|s| s.gateway.as_str()).collect();
        assert_eq!(gateways, vec!["de-fra.wg", "de-fra.ovpn"]);
    }

    #[test]
    fn test_filter_respects_protocol_universe() {
        let snapshot = snapshot();
        let opts = FilterOptions {
            protocol: Some(Protocol::OpenVPN),
            country_code: true,
            ..FilterOptions::default()
        };
        let matched = filter_servers(&snapshot, "de", &opts);
        let gateways: Vec<&str> = matched.iter().map(|s| s.gateway.as_str()).collect();
        assert_eq!(gateways, vec!["de-fra.ovpn", "de-ber.ovpn"]);
    }

    #[test]
    fn test_invert_is_complement_within_protocol_universe() {
        let snapshot = snapshot();
        for protocol in [Some(Protocol::WireGuard), Some(Protocol::OpenVPN), None] {
            let opts = FilterOptions {
                protocol,
                country_code: true,
                ..FilterOptions::default()
            };
            let inverted_opts = FilterOptions {
                invert: true,
                ..opts.clone()
            };

            let universe = filter_servers(&snapshot, "", &opts);
            let matched = filter_servers(&snapshot, "de", &opts);
            let inverted = filter_servers(&snapshot, "de", &inverted_opts);

            let mut recombined: Vec<&str> = matched
                .iter()
                .chain(inverted.iter())
                .map(|s| s.gateway.as_str())
                .collect();
            recombined.sort_unstable();
            let mut expected: Vec<&str> = universe.iter().map(|s| s.gateway.as_str()).collect();
            expected.sort_unstable();
            assert_eq!(recombined, expected);
        }
    }

    #[test]
    fn test_select_single_not_found() {
        assert_eq!(
            select_single(&[], false).unwrap_err(),
            ResolutionError::NotFound
        );
    }

    #[test]
    fn test_select_single_ambiguous_without_any() {
        let snapshot = snapshot();
        let candidates = filter_servers(&snapshot, "us", &FilterOptions::default());
        assert_eq!(
            select_single(&candidates, false).unwrap_err(),
            ResolutionError::Ambiguous(2)
        );
    }

    #[test]
    fn test_select_single_any_takes_first_in_catalog_order() {
        let snapshot = snapshot();
        let candidates = filter_servers(&snapshot, "us", &FilterOptions::default());
        assert_eq!(select_single(&candidates, true).unwrap().gateway, "us-ny.wg");
    }

    #[test]
    fn test_select_fastest_lowest_latency_wins() {
        let snapshot = snapshot();
        let opts = FilterOptions {
            protocol: Some(Protocol::WireGuard),
            ..FilterOptions::default()
        };
        let candidates = filter_servers(&snapshot, "", &opts);
        let fastest = select_fastest(&candidates, false, &FixedProber).unwrap();
        assert_eq!(fastest.gateway, "us-chi.wg");
    }

    #[test]
    fn test_select_fastest_all_probes_fail() {
        let snapshot = snapshot();
        let candidates = filter_servers(&snapshot, "us", &FilterOptions::default());

        let err = select_fastest(&candidates, false, &DeadProber).unwrap_err();
        assert!(matches!(err, ResolutionError::ProbeFailed(_)));

        // With -any the first candidate in catalog order is the fallback
        let fallback = select_fastest(&candidates, true, &DeadProber).unwrap();
        assert_eq!(fallback.gateway, "us-ny.wg");
    }

    #[test]
    fn test_resolve_exact() {
        let snapshot = snapshot();
        let entry = resolve_exact(&snapshot, "de-ber.ovpn", Protocol::OpenVPN).unwrap();
        assert_eq!(entry.city, "Berlin");

        assert_eq!(
            resolve_exact(&snapshot, "de-ber", Protocol::OpenVPN).unwrap_err(),
            ResolutionError::NotFound
        );
        // Exact match only: a WireGuard-capable record never resolves
        // for the OpenVPN universe
        assert_eq!(
            resolve_exact(&snapshot, "us-ny.wg", Protocol::OpenVPN).unwrap_err(),
            ResolutionError::NotFound
        );
    }
}
