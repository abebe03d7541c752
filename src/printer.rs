//! Operator-facing output. Every line is tagged with the scope of the
//! component that printed it; status goes to stdout, problems to stderr.

use chrono::Local;
use crossterm::style::Stylize;

#[derive(Debug, Clone)]
pub struct Printer {
    scope: String,
    verbose: bool,
}

impl Printer {
    pub fn new(scope: &str, verbose: bool) -> Self {
        Printer {
            scope: scope.to_string(),
            verbose,
        }
    }

    /// Same verbosity, different tag.
    pub fn scoped(&self, scope: &str) -> Self {
        Printer::new(scope, self.verbose)
    }

    pub fn info(&self, message: &str) {
        println!("{} {} {}", "∘".green(), self.scope.as_str().dark_grey(), message.cyan());
    }

    pub fn success(&self, message: &str) {
        println!("{} {} {}", "✔".green(), self.scope.as_str().dark_grey(), message.cyan());
    }

    pub fn neutral(&self, message: &str) {
        println!("  {} {}", ">".dark_grey(), message.dark_grey());
    }

    pub fn path(&self, title: &str, path: &str) {
        println!(
            "  {} {} {} {}",
            "|".dark_grey(),
            title.dark_grey(),
            "→".dark_grey(),
            path.dark_grey()
        );
    }

    /// Aligned `key ⦂ value` line used for the resolved-options banner.
    pub fn env(&self, key: &str, value: &str) {
        println!("{key:>15} {} {}", "⦂".dark_grey(), value.cyan());
    }

    pub fn group(&self) {
        println!();
    }

    pub fn done(&self, message: &str) {
        let at = Local::now().format("%H:%M:%S").to_string();
        println!();
        println!("{} {} {}", "♥".red(), message.bold(), at.dark_grey());
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{} {} {}", "!".yellow(), self.scope.as_str().dark_grey(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("❌ {}", message.red());
    }

    /// Extra detail under an error, e.g. captured stderr of a failed tool.
    pub fn detail(&self, line: &str) {
        eprintln!("   {}", line.dark_grey());
    }

    pub fn help(&self, message: &str) {
        eprintln!("🤔 {}", message.yellow());
    }

    /// Echo an external command before it runs. Only with `--verbose`.
    pub fn trace(&self, program: &str, args: &[String]) {
        if self.verbose {
            println!("  {} {} {}", "$".dark_grey(), program.dark_grey(), args.join(" ").dark_grey());
        }
    }
}
