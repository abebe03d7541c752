use crate::config::Settings;
use crate::connection::SA_PASSWORD;
use crate::context::Context;
use crate::error::{OptiError, Result};
use crate::printer::Printer;
use crate::process;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const DESCRIPTOR_FILE: &str = "docker-compose.yml";
const SERVICE_NAME: &str = "sqledge";
const DESCRIPTOR_HEADER: &str = "# This file was generated using the opti cli tool\n";

/// Handle on the container runtime, scoped to one project stack.
#[derive(Debug, Clone)]
pub struct Docker {
    pub bin: String,
    pub root: PathBuf,
    pub stack: String,
    printer: Printer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names")]
    pub names: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
}

/// Outcome of racing a log stream against a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    /// The stream ended before the marker showed up.
    Closed,
}

/// Compose project names allow lowercase alphanumerics, `-` and `_`.
pub fn stack_name(project: &str) -> String {
    let s: String = project
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let s = s.trim_matches(|c| c == '-' || c == '_').to_string();
    if s.is_empty() {
        "opti".to_string()
    } else {
        s
    }
}

impl Docker {
    pub fn new(ctx: &Context) -> Self {
        Docker {
            bin: ctx.settings.docker_bin.clone(),
            root: ctx.root.clone(),
            stack: stack_name(&ctx.project_name()),
            printer: ctx.printer.scoped("docker"),
        }
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// Daemon reachable (installed is not enough).
    pub async fn available(&self) -> bool {
        process::output(&self.printer, &self.bin, &["info"], &self.root)
            .await
            .is_ok()
    }

    pub async fn is_running(&self, name: &str) -> Result<bool> {
        let filter = format!("name={name}");
        let out = process::output(
            &self.printer,
            &self.bin,
            &["ps", "--filter", &filter, "--format", "{{.Names}}"],
            &self.root,
        )
        .await?;
        // The name filter matches substrings.
        Ok(out.lines().any(|l| container_name(l) == name))
    }

    async fn compose(&self, args: &[&str]) -> Result<()> {
        let descriptor = self.descriptor_path();
        let mut full: Vec<String> = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.stack.clone(),
            "-f".to_string(),
            descriptor.display().to_string(),
        ];
        full.extend(args.iter().map(|s| s.to_string()));
        process::run(&self.printer, &self.bin, &full, &self.root).await
    }

    pub async fn start(&self) -> Result<()> {
        self.require_descriptor()?;
        self.compose(&["up", "-d"]).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.require_descriptor()?;
        self.compose(&["stop"]).await
    }

    /// Remove containers, volumes and images of the stack.
    pub async fn destroy(&self) -> Result<()> {
        self.require_descriptor()?;
        self.printer.info(&format!("Killing compose stack {}...", self.stack));
        self.compose(&["down", "--volumes", "--rmi", "all"]).await?;
        self.printer.success(&format!("Container stack {} killed", self.stack));
        Ok(())
    }

    fn require_descriptor(&self) -> Result<()> {
        if self.descriptor_path().exists() {
            return Ok(());
        }
        Err(OptiError::missing_input(
            format!("No {DESCRIPTOR_FILE} in {}", self.root.display()),
            Some("Run <opti db> in the project root to generate it"),
        ))
    }

    /// Wait until `name` logs `marker`, considering only output produced at
    /// or after `since`.
    pub async fn await_readiness(
        &self,
        name: &str,
        marker: &str,
        timeout_secs: u64,
        since: DateTime<Utc>,
    ) -> Result<()> {
        let args = vec![
            "logs".to_string(),
            "-f".to_string(),
            "--since".to_string(),
            since.to_rfc3339_opts(SecondsFormat::Nanos, true),
            name.to_string(),
        ];
        let (mut child, mut rx) = process::spawn_lines(&self.printer, &self.bin, &args, &self.root)?;

        let outcome = wait_for_marker(&mut rx, marker, Duration::from_secs(timeout_secs)).await;
        let _ = child.kill().await;

        match outcome {
            Readiness::Ready => Ok(()),
            Readiness::TimedOut => Err(OptiError::ReadinessTimeout {
                container: name.to_string(),
                marker: marker.to_string(),
                timeout_secs,
            }),
            Readiness::Closed => Err(OptiError::process(
                &self.bin,
                format!("logs for {name} ended before '{marker}' appeared"),
                vec![],
            )),
        }
    }

    /// Start the stack and block on readiness unless the container already runs.
    pub async fn ensure_running(&self, name: &str, settings: &Settings) -> Result<()> {
        if self.is_running(name).await? {
            self.printer.neutral(&format!("{name} is already running"));
            return Ok(());
        }
        self.printer.info("Starting database...");
        let since = Utc::now();
        self.start().await?;
        self.await_readiness(name, &settings.ready_marker, settings.ready_timeout_secs, since)
            .await?;
        self.printer.success("Database started successfully!");
        Ok(())
    }

    /// Host ports bound, or configured to be bound, by any known container.
    pub async fn host_ports_in_use(&self) -> Result<HashSet<u16>> {
        let out = process::output(
            &self.printer,
            &self.bin,
            &["ps", "-a", "--no-trunc", "--format", "{{json .}}"],
            &self.root,
        )
        .await?;

        let mut ports = HashSet::new();
        let mut ids = Vec::new();
        for line in out.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            if let Ok(c) = serde_json::from_str::<ContainerSummary>(line) {
                ports.extend(host_ports_from_ps(&c.ports));
                ids.push(c.id);
            }
        }

        if !ids.is_empty() {
            let mut args = vec!["inspect"];
            args.extend(ids.iter().map(|s| s.as_str()));
            match process::output(&self.printer, &self.bin, &args, &self.root).await {
                Ok(raw) => {
                    if let Ok(v) = serde_json::from_str::<Value>(&raw) {
                        ports.extend(host_ports_from_inspect(&v));
                    }
                }
                // Containers can vanish between ps and inspect.
                Err(e) => self.printer.warn(&format!("docker inspect failed: {e}")),
            }
        }

        Ok(ports)
    }
}

pub fn container_name(raw_names: &str) -> String {
    raw_names
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('/')
        .to_string()
}

/// Consume lines until one contains `marker`, the stream closes, or `timeout`
/// elapses, whichever comes first.
pub async fn wait_for_marker(rx: &mut UnboundedReceiver<String>, marker: &str, timeout: Duration) -> Readiness {
    let scan = async {
        while let Some(line) = rx.recv().await {
            if line.contains(marker) {
                return Readiness::Ready;
            }
        }
        Readiness::Closed
    };
    tokio::time::timeout(timeout, scan)
        .await
        .unwrap_or(Readiness::TimedOut)
}

fn ps_ports_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":(\d+)(?:-(\d+))?->").expect("valid ports regex"))
}

/// Host ports from the `Ports` column of `docker ps`, e.g.
/// `0.0.0.0:1433->1433/tcp, :::8000-8002->8000-8002/tcp`.
pub fn host_ports_from_ps(ports: &str) -> Vec<u16> {
    let mut out = Vec::new();
    for caps in ps_ports_re().captures_iter(ports) {
        let Some(first) = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok()) else {
            continue;
        };
        let last = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .unwrap_or(first);
        out.extend(first..=last.max(first));
    }
    out
}

/// Host ports from a `docker inspect` array: live bindings of running
/// containers and configured bindings of stopped ones.
pub fn host_ports_from_inspect(inspect: &Value) -> Vec<u16> {
    let mut out = Vec::new();
    let Some(items) = inspect.as_array() else {
        return out;
    };
    for item in items {
        let live = item.get("NetworkSettings").and_then(|x| x.get("Ports"));
        let configured = item.get("HostConfig").and_then(|x| x.get("PortBindings"));
        for map in [live, configured].into_iter().flatten() {
            let Value::Object(map) = map else { continue };
            for bindings in map.values() {
                let Value::Array(arr) = bindings else { continue };
                for b in arr {
                    if let Some(p) = b
                        .get("HostPort")
                        .and_then(|x| x.as_str())
                        .and_then(|s| s.parse::<u16>().ok())
                    {
                        out.push(p);
                    }
                }
            }
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ComposeFile {
    pub services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ComposeService {
    pub image: String,
    pub container_name: String,
    pub environment: Vec<String>,
    pub ports: Vec<String>,
    pub cap_add: Vec<String>,
    pub restart: String,
}

pub fn descriptor(settings: &Settings, container_name: &str, port: &str) -> ComposeFile {
    let service = ComposeService {
        image: settings.image.clone(),
        container_name: container_name.to_string(),
        environment: vec!["ACCEPT_EULA=1".to_string(), format!("MSSQL_SA_PASSWORD={SA_PASSWORD}")],
        ports: vec![port.to_string()],
        cap_add: vec!["SYS_PTRACE".to_string()],
        restart: "unless-stopped".to_string(),
    };
    ComposeFile {
        services: BTreeMap::from([(SERVICE_NAME.to_string(), service)]),
    }
}

pub fn render_descriptor(file: &ComposeFile) -> Result<String> {
    let yaml = serde_yaml::to_string(file)
        .map_err(|e| OptiError::persistence("serialize", Path::new(DESCRIPTOR_FILE), e))?;
    Ok(format!("{DESCRIPTOR_HEADER}{yaml}"))
}

pub fn write_descriptor(root: &Path, file: &ComposeFile) -> Result<PathBuf> {
    let path = root.join(DESCRIPTOR_FILE);
    let body = render_descriptor(file)?;
    fs::write(&path, body).map_err(|e| OptiError::persistence("write", &path, e))?;
    Ok(path)
}
