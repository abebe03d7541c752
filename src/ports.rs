use crate::config::ENGINE_PORT;
use crate::docker::Docker;
use crate::error::{OptiError, Result};
use crate::printer::Printer;
use regex::Regex;
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::OnceLock;

/// Upper bound on probes before giving up.
pub const MAX_ATTEMPTS: u32 = 1000;

fn port_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{1,5})(?::(\d{1,5}))?\s*$").expect("valid port regex"))
}

fn valid(n: &str) -> Option<u16> {
    n.parse::<u16>().ok().filter(|p| *p > 0)
}

/// Normalize a `--port` value to `host:container`. A bare host port maps to
/// the engine port.
pub fn normalize_spec(raw: &str) -> Result<String> {
    let invalid = || {
        OptiError::missing_input(
            format!("Port '{raw}' is not an integer"),
            Some("Use --port <host> or --port <host>:<container>, e.g. --port 1434"),
        )
    };
    let caps = port_spec_re().captures(raw).ok_or_else(invalid)?;
    let host = valid(&caps[1]).ok_or_else(invalid)?;
    let container = match caps.get(2) {
        Some(m) => valid(m.as_str()).ok_or_else(invalid)?,
        None => ENGINE_PORT,
    };
    Ok(format!("{host}:{container}"))
}

/// First port at or above `start` for which `is_taken` is false. Never goes
/// below `start`; gives up after `MAX_ATTEMPTS` probes or at the end of the
/// port range.
pub fn find_available_port(start: u16, mut is_taken: impl FnMut(u16) -> bool) -> Result<u16> {
    let mut port = start;
    for attempt in 1..=MAX_ATTEMPTS {
        if !is_taken(port) {
            return Ok(port);
        }
        port = match port.checked_add(1) {
            Some(p) => p,
            None => return Err(OptiError::PortExhausted { start, attempts: attempt }),
        };
    }
    Err(OptiError::PortExhausted {
        start,
        attempts: MAX_ATTEMPTS,
    })
}

/// Something outside docker already listens on the port. Binds the wildcard
/// address: a loopback-only bind can succeed next to a `0.0.0.0` listener.
fn bound_locally(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_err()
}

/// Allocate a host port for the database container. Container bindings come
/// from the runtime; if it cannot be queried every port is assumed free of
/// containers and a warning is printed.
pub async fn allocate(docker: &Docker, printer: &Printer, start: u16) -> Result<u16> {
    let occupied: HashSet<u16> = match docker.host_ports_in_use().await {
        Ok(ports) => ports,
        Err(e) => {
            printer.warn(&format!(
                "Could not query docker for used ports ({e}); assuming {start} and up are free"
            ));
            HashSet::new()
        }
    };
    find_available_port(start, |p| occupied.contains(&p) || bound_locally(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_first_free_port_after_occupied_run() {
        for k in [0u16, 1, 5, 42] {
            let p = 20_000;
            let got = find_available_port(p, |port| port < p + k).unwrap();
            assert_eq!(got, p + k);
        }
    }

    #[test]
    fn never_returns_below_start_and_probes_monotonically() {
        let mut probed = Vec::new();
        let got = find_available_port(1433, |port| {
            probed.push(port);
            port == 1433 || port == 1434 || port < 1433
        })
        .unwrap();
        assert_eq!(got, 1435);
        assert_eq!(probed, vec![1433, 1434, 1435]);
    }

    #[test]
    fn gives_up_after_cap() {
        let mut probes = 0;
        let err = find_available_port(1433, |_| {
            probes += 1;
            true
        })
        .unwrap_err();
        assert_eq!(probes, MAX_ATTEMPTS);
        assert!(matches!(err, OptiError::PortExhausted { start: 1433, attempts: MAX_ATTEMPTS }));
    }

    #[test]
    fn gives_up_at_end_of_range() {
        let err = find_available_port(65_534, |_| true).unwrap_err();
        assert!(matches!(err, OptiError::PortExhausted { attempts: 2, .. }));
    }

    #[test]
    fn port_specs_normalize() {
        assert_eq!(normalize_spec("1434").unwrap(), "1434:1433");
        assert_eq!(normalize_spec("1500:1433").unwrap(), "1500:1433");
        assert_eq!(normalize_spec(" 1500 ").unwrap(), "1500:1433");
        for bad in ["", "abc", "14a4", "0", "70000", "1434:", ":1433", "1434:0", "1:2:3"] {
            assert!(
                matches!(normalize_spec(bad), Err(OptiError::MissingInput { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    fn free_port() -> u16 {
        TcpListener::bind(("0.0.0.0", 0)).unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn wildcard_listener_counts_as_bound() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(bound_locally(port));
    }

    #[tokio::test]
    async fn unreachable_runtime_still_allocates_from_start() {
        use crate::config::Settings;
        use crate::context::Context;

        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            docker_bin: "definitely-not-docker-4711".to_string(),
            ..Settings::default()
        };
        let ctx = Context::new(tmp.path().to_path_buf(), settings, Printer::new("test", false));
        let start = free_port();

        let got = allocate(&Docker::new(&ctx), &ctx.printer, start).await.unwrap();
        assert_eq!(got, start);
    }
}
