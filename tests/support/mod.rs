//! Sandbox project with fake `docker`, `sqlpackage` and `dotnet` binaries that
//! append their arguments to a shared log.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub struct Sandbox {
    _tmp: TempDir,
    pub root: PathBuf,
    pub bin: PathBuf,
    pub log: PathBuf,
}

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "docker $*" >> "__LOG__"
case "$1" in
  ps)
    if [ "$2" = "-a" ] && [ -n "$FAKE_PS_FAIL" ]; then
      echo "Cannot connect to the Docker daemon" >&2
      exit 1
    elif [ "$2" = "-a" ]; then
      echo '{"ID":"abc123","Names":"other-db","State":"running","Status":"Up","Ports":"0.0.0.0:1433->1433/tcp"}'
    elif [ -n "$FAKE_RUNNING" ]; then
      echo "$FAKE_RUNNING"
    fi
    ;;
  inspect)
    echo '[]'
    ;;
  logs)
    if [ -n "$FAKE_LOGS_HANG" ]; then
      exec sleep 10
    fi
    echo "starting engine"
    echo "EdgeTelemetry starting up"
    ;;
esac
exit 0
"#;

const FAKE_TOOL: &str = r#"#!/bin/sh
echo "__NAME__ $*" >> "__LOG__"
if [ -n "$FAKE_TOOL_FAIL" ] && [ "$1" != "--version" ]; then
  echo "boom: $FAKE_TOOL_FAIL" >&2
  exit 2
fi
exit 0
"#;

impl Sandbox {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("shop");
        let bin = tmp.path().join("fakebin");
        fs::create_dir_all(&root).expect("create root");
        fs::create_dir_all(&bin).expect("create bin");
        let log = tmp.path().join("calls.log");

        let sandbox = Sandbox { _tmp: tmp, root, bin, log };
        let log_str = sandbox.log.display().to_string();
        sandbox.script("docker", &FAKE_DOCKER.replace("__LOG__", &log_str));
        for tool in ["sqlpackage", "dotnet"] {
            sandbox.script(tool, &FAKE_TOOL.replace("__LOG__", &log_str).replace("__NAME__", tool));
        }
        sandbox
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.bin.join(name);
        fs::write(&path, body).expect("write fake binary");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake binary");
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(&path, content).expect("write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).expect("read file")
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// `opti` running in the project root against the fake binaries.
    pub fn opti(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("opti");
        cmd.current_dir(&self.root)
            .env("DOCKER_BIN", self.bin.join("docker"))
            .env("SQLPACKAGE_BIN", self.bin.join("sqlpackage"))
            .env("DOTNET_BIN", self.bin.join("dotnet"))
            .env("BREW_BIN", self.bin.join("brew-missing"))
            .env_remove("OPTI_CONTAINER_PREFIX")
            .env_remove("OPTI_READY_TIMEOUT")
            .env_remove("OPTI_DEFAULT_PORT")
            .env_remove("OPTI_CONNECTION_STRING_KEY")
            .env_remove("OPTI_READY_MARKER")
            .env_remove("FAKE_RUNNING")
            .env_remove("FAKE_LOGS_HANG")
            .env_remove("FAKE_TOOL_FAIL")
            .env_remove("FAKE_PS_FAIL")
            .write_stdin("");
        cmd
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}

pub fn settings_json() -> &'static str {
    r#"{
  "Logging": {
    "LogLevel": {
      "Default": "Information"
    }
  },
  "ConnectionStrings": {
    "EPiServerDB": ""
  },
  "AllowedHosts": "*"
}
"#
}
