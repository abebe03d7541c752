//! `dotnet watch` with a launch profile picked from `launchSettings.json`.

use crate::context::Context;
use crate::error::{OptiError, Result};
use crate::files::{self, Match};
use crate::process;
use crate::prompt::{self, Choice};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LAUNCH_SETTINGS_FILE: &str = "launchSettings.json";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchProfile {
    pub name: String,
    pub application_url: Option<String>,
}

impl LaunchProfile {
    /// First of the `;`-separated application URLs.
    pub fn first_url(&self) -> Option<&str> {
        self.application_url
            .as_deref()
            .and_then(|u| u.split(';').map(str::trim).find(|s| !s.is_empty()))
    }
}

/// Profiles that run the project itself, in file order.
pub fn project_profiles(raw: &str) -> Result<Vec<LaunchProfile>, String> {
    let doc: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let profiles = doc
        .get("profiles")
        .and_then(|p| p.as_object())
        .ok_or_else(|| "no 'profiles' object".to_string())?;

    Ok(profiles
        .iter()
        .filter(|(_, p)| p.get("commandName").and_then(|c| c.as_str()) == Some("Project"))
        .map(|(name, p)| LaunchProfile {
            name: name.clone(),
            application_url: p
                .get("applicationUrl")
                .and_then(|u| u.as_str())
                .map(str::to_string),
        })
        .collect())
}

/// `<project>/Properties/launchSettings.json` → `<project>`.
pub fn project_dir(launch_settings: &Path) -> PathBuf {
    let dir = launch_settings.parent().unwrap_or(launch_settings);
    if dir.file_name().and_then(|n| n.to_str()) == Some("Properties") {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

pub fn watch_args(project: &Path, profile: &str) -> Vec<String> {
    vec![
        "watch".to_string(),
        "--project".to_string(),
        project.display().to_string(),
        "run".to_string(),
        "--launch-profile".to_string(),
        profile.to_string(),
    ]
}

fn pick_profile(profiles: Vec<LaunchProfile>, wanted: Option<&str>, file: &str) -> Result<LaunchProfile> {
    if let Some(wanted) = wanted {
        let names: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();
        return profiles.into_iter().find(|p| p.name == wanted).ok_or_else(|| {
            OptiError::missing_input(
                format!("No launch profile named '{wanted}' in {file}"),
                Some(&format!("Available profiles: {}", names.join(", "))),
            )
        });
    }
    if profiles.is_empty() {
        return Err(OptiError::missing_input(
            format!("No runnable (commandName: Project) profiles in {file}"),
            None,
        ));
    }
    let choices = profiles
        .into_iter()
        .map(|p| Choice {
            label: match p.first_url() {
                Some(url) => format!("{} ({url})", p.name),
                None => p.name.clone(),
            },
            value: p,
        })
        .collect();
    prompt::select("What profile do you want to run?", choices)
}

pub async fn watch(ctx: &Context, profile: Option<&str>, open_browser: bool) -> Result<()> {
    let printer = ctx.printer.scoped("watch");

    let found = files::search(&ctx.root, Match::Name(LAUNCH_SETTINGS_FILE));
    if found.is_empty() {
        return Err(OptiError::missing_input(
            format!("No {LAUNCH_SETTINGS_FILE} found in this project"),
            Some("Run the command from the root of the web project"),
        ));
    }
    let choices = found
        .into_iter()
        .map(|p| Choice {
            label: ctx.display_path(&p),
            value: p,
        })
        .collect();
    let file = prompt::select("What launchSettings do you want to use?", choices)?;

    let shown = ctx.display_path(&file);
    let raw = fs::read_to_string(&file).map_err(|e| OptiError::persistence("read", &file, e))?;
    let profiles = project_profiles(&raw).map_err(|e| OptiError::persistence("parse", &file, e))?;
    let chosen = pick_profile(profiles, profile, &shown)?;

    let project = project_dir(&file);
    printer.info(&format!("Running profile {}", chosen.name));
    printer.path("Project", &ctx.display_path(&project));

    let args = watch_args(&project, &chosen.name);
    let mut child = process::spawn_foreground(&printer, &ctx.settings.dotnet_bin, &args, &ctx.root)?;

    if open_browser {
        match chosen.first_url() {
            Some(url) => {
                if let Err(e) = open::that(url) {
                    printer.warn(&format!("Could not open {url}: {e}"));
                }
            }
            None => printer.warn("Profile has no applicationUrl to open"),
        }
    }

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| OptiError::process(&ctx.settings.dotnet_bin, e.to_string(), vec![]))?;
            if status.success() {
                Ok(())
            } else {
                Err(OptiError::process(
                    &ctx.settings.dotnet_bin,
                    format!("watch exited with {status}"),
                    vec![],
                ))
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // The terminal sent SIGINT to dotnet too; give it time to stop.
            if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
                process::terminate(&mut child);
                let _ = child.wait().await;
            }
            Err(OptiError::Cancelled("bye! 👋".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAUNCH: &str = r#"{
      "iisSettings": { "windowsAuthentication": false },
      "profiles": {
        "Web": {
          "commandName": "Project",
          "applicationUrl": "https://localhost:5001;http://localhost:5000"
        },
        "IIS Express": { "commandName": "IISExpress" },
        "Alloy": { "commandName": "Project" }
      }
    }"#;

    #[test]
    fn only_project_profiles_in_file_order() {
        let profiles = project_profiles(LAUNCH).unwrap();
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Web", "Alloy"]);
        assert_eq!(profiles[0].first_url(), Some("https://localhost:5001"));
        assert_eq!(profiles[1].first_url(), None);
    }

    #[test]
    fn missing_profiles_is_an_error() {
        assert!(project_profiles(r#"{"iisSettings":{}}"#).is_err());
        assert!(project_profiles("not json").is_err());
    }

    #[test]
    fn project_dir_skips_properties_folder() {
        assert_eq!(
            project_dir(Path::new("/p/src/Web/Properties/launchSettings.json")),
            PathBuf::from("/p/src/Web")
        );
        assert_eq!(project_dir(Path::new("/p/launchSettings.json")), PathBuf::from("/p"));
    }

    #[test]
    fn named_profile_is_picked_without_prompt() {
        let profiles = project_profiles(LAUNCH).unwrap();
        let got = pick_profile(profiles.clone(), Some("Alloy"), "launchSettings.json").unwrap();
        assert_eq!(got.name, "Alloy");

        let err = pick_profile(profiles, Some("Nope"), "launchSettings.json").unwrap_err();
        assert!(matches!(err, OptiError::MissingInput { .. }));
    }

    #[test]
    fn watch_arguments() {
        assert_eq!(
            watch_args(Path::new("/p/src/Web"), "Web"),
            vec!["watch", "--project", "/p/src/Web", "run", "--launch-profile", "Web"]
        );
    }
}
