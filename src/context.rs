use crate::config::{self, Settings};
use crate::printer::Printer;
use std::path::{Path, PathBuf};

/// Everything a command needs: where the project lives, how to reach the
/// external tools, and where to print. Passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub settings: Settings,
    pub printer: Printer,
}

impl Context {
    pub fn new(root: PathBuf, settings: Settings, printer: Printer) -> Self {
        Context {
            root,
            settings,
            printer,
        }
    }

    /// Context for `root` with `.opti/.env` applied to the environment first.
    pub fn load(root: PathBuf, verbose: bool) -> Self {
        config::load_env(&root);
        Context::new(root, Settings::from_env(), Printer::new("opti", verbose))
    }

    /// Same context, printing under a different scope.
    pub fn scoped(&self, scope: &str) -> Self {
        Context {
            root: self.root.clone(),
            settings: self.settings.clone(),
            printer: self.printer.scoped(scope),
        }
    }

    /// Project name used for display and as the compose stack identifier.
    pub fn project_name(&self) -> String {
        self.root
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("project")
            .to_string()
    }

    /// `path` relative to the project root when possible, for display.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| format!("/{}", p.display()))
            .unwrap_or_else(|_| path.display().to_string())
    }
}
