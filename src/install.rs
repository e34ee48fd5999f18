//! Install and remove the Hopper launcher script.
//!
//! The launcher is a small Hopper Python script that exports the open
//! documents to a snapshot and starts `hopper-mcp serve-http` on it.
//! Only the binary path is detected; the server is a native executable, so
//! there is no interpreter to locate, and the other two placeholders carry
//! the bind address and log filter the launcher passes to it.

use anyhow::{bail, Context};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Launcher template shipped with the binary.
pub const SCRIPT_TEMPLATE: &str = include_str!("../templates/hopper_launcher.py");
/// File name of the installed launcher inside the Hopper Scripts directory.
pub const SCRIPT_NAME: &str = "hopper_mcp.py";

const BIN_PLACEHOLDER: &str = "{{HOPPER_MCP_BIN}}";
const BIND_PLACEHOLDER: &str = "{{HOPPER_MCP_BIND}}";
const LOG_PLACEHOLDER: &str = "{{HOPPER_MCP_LOG}}";

/// Values substituted into the launcher template.
#[derive(Debug, Clone)]
pub struct Substitutions {
    pub bin: String,
    pub bind: String,
    pub log: String,
}

impl Substitutions {
    /// Substitutions for the running executable.
    pub fn detect(bind: &str, log: &str) -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("cannot locate the hopper-mcp executable")?;
        let exe = exe.canonicalize().unwrap_or(exe);
        Ok(Self {
            bin: exe.display().to_string(),
            bind: bind.to_string(),
            log: log.to_string(),
        })
    }

    fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (BIN_PLACEHOLDER, self.bin.as_str()),
            (BIND_PLACEHOLDER, self.bind.as_str()),
            (LOG_PLACEHOLDER, self.log.as_str()),
        ]
    }
}

pub fn render_template(template: &str, subs: &Substitutions) -> String {
    subs.pairs()
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        })
}

/// Hopper Scripts directory for `os` (as in `std::env::consts::OS`).
pub fn scripts_dir_for(os: &str, home: &Path) -> anyhow::Result<PathBuf> {
    match os {
        "macos" => Ok(home
            .join("Library")
            .join("Application Support")
            .join("Hopper")
            .join("Scripts")),
        "linux" => Ok(home
            .join("GNUstep")
            .join("Library")
            .join("ApplicationSupport")
            .join("Hopper")
            .join("Scripts")),
        other => bail!("Unsupported platform: {other}. Only macOS and Linux are supported."),
    }
}

pub fn scripts_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    scripts_dir_for(std::env::consts::OS, Path::new(&home))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Overwrite an existing launcher without asking.
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Remove without asking.
    pub confirm: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was written; the path is where the action would apply.
    DryRun(PathBuf),
    Done(PathBuf),
    Cancelled,
    NotInstalled(PathBuf),
}

/// Render the launcher into `dir`. `confirm` is asked before an existing
/// launcher is overwritten (unless forced).
pub fn install(
    dir: &Path,
    subs: &Substitutions,
    opts: InstallOptions,
    mut confirm: impl FnMut(&str) -> io::Result<bool>,
) -> anyhow::Result<Outcome> {
    let target = dir.join(SCRIPT_NAME);
    let script = render_template(SCRIPT_TEMPLATE, subs);
    for (placeholder, value) in subs.pairs() {
        info!(placeholder, value, "Template substitution");
    }

    if opts.dry_run {
        info!(dir = %dir.display(), "Would create directory");
        info!(target = %target.display(), "Would write launcher");
        return Ok(Outcome::DryRun(target));
    }

    if target.exists() && !opts.force {
        let question = format!(
            "Script already exists at {}. Overwrite? (y/N): ",
            target.display()
        );
        if !confirm(&question)? {
            return Ok(Outcome::Cancelled);
        }
    }

    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    fs::write(&target, script).with_context(|| format!("cannot write {}", target.display()))?;
    info!(target = %target.display(), "Launcher installed");
    Ok(Outcome::Done(target))
}

/// Remove the launcher from `dir`, asking `confirm` first unless confirmed.
pub fn uninstall(
    dir: &Path,
    opts: UninstallOptions,
    mut confirm: impl FnMut(&str) -> io::Result<bool>,
) -> anyhow::Result<Outcome> {
    let target = dir.join(SCRIPT_NAME);
    if !target.exists() {
        return Ok(Outcome::NotInstalled(target));
    }
    if opts.dry_run {
        info!(target = %target.display(), "Would remove launcher");
        return Ok(Outcome::DryRun(target));
    }
    if !opts.confirm {
        let question = format!("Remove hopper-mcp launcher at {}? (y/N): ", target.display());
        if !confirm(&question)? {
            return Ok(Outcome::Cancelled);
        }
    }
    fs::remove_file(&target).with_context(|| format!("cannot remove {}", target.display()))?;
    info!(target = %target.display(), "Launcher removed");
    Ok(Outcome::Done(target))
}

/// Ask a yes/no question on the terminal. Anything but `y`/`yes` is no.
pub fn prompt_stdin(question: &str) -> io::Result<bool> {
    let mut stdout = io::stdout();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs() -> Substitutions {
        Substitutions {
            bin: "/opt/bin/hopper-mcp".to_string(),
            bind: "127.0.0.1:42069".to_string(),
            log: "hopper_mcp=debug".to_string(),
        }
    }

    fn never(_: &str) -> io::Result<bool> {
        panic!("unexpected prompt")
    }

    #[test]
    fn test_template_has_every_placeholder_and_renders_clean() {
        for placeholder in [BIN_PLACEHOLDER, BIND_PLACEHOLDER, LOG_PLACEHOLDER] {
            assert!(SCRIPT_TEMPLATE.contains(placeholder), "{placeholder}");
        }
        let script = render_template(SCRIPT_TEMPLATE, &subs());
        assert!(!script.contains("{{"));
        assert!(script.contains("HOPPER_MCP_BIN = \"/opt/bin/hopper-mcp\""));
        assert!(script.contains("127.0.0.1:42069"));
    }

    #[test]
    fn test_scripts_dir_per_platform() {
        let home = Path::new("/home/me");
        assert_eq!(
            scripts_dir_for("macos", home).unwrap(),
            PathBuf::from("/home/me/Library/Application Support/Hopper/Scripts")
        );
        assert_eq!(
            scripts_dir_for("linux", home).unwrap(),
            PathBuf::from("/home/me/GNUstep/Library/ApplicationSupport/Hopper/Scripts")
        );
        assert!(scripts_dir_for("windows", home).is_err());
    }

    #[test]
    fn test_install_dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Scripts");
        let opts = InstallOptions {
            force: false,
            dry_run: true,
        };
        let outcome = install(&dir, &subs(), opts, never).unwrap();
        assert_eq!(outcome, Outcome::DryRun(dir.join(SCRIPT_NAME)));
        assert!(!dir.exists());
    }

    #[test]
    fn test_install_prompts_before_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Scripts");
        let target = dir.join(SCRIPT_NAME);

        let outcome = install(&dir, &subs(), InstallOptions::default(), never).unwrap();
        assert_eq!(outcome, Outcome::Done(target.clone()));
        fs::write(&target, "old").unwrap();

        let outcome = install(&dir, &subs(), InstallOptions::default(), |_| Ok(false)).unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");

        let forced = InstallOptions {
            force: true,
            dry_run: false,
        };
        install(&dir, &subs(), forced, never).unwrap();
        assert!(fs::read_to_string(&target)
            .unwrap()
            .contains("hopper_mcp=debug"));
    }

    #[test]
    fn test_uninstall() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let target = dir.join(SCRIPT_NAME);
        assert_eq!(
            uninstall(dir, UninstallOptions::default(), never).unwrap(),
            Outcome::NotInstalled(target.clone())
        );

        fs::write(&target, "x").unwrap();
        assert_eq!(
            uninstall(dir, UninstallOptions::default(), |_| Ok(false)).unwrap(),
            Outcome::Cancelled
        );
        let dry = UninstallOptions {
            confirm: false,
            dry_run: true,
        };
        assert_eq!(
            uninstall(dir, dry, never).unwrap(),
            Outcome::DryRun(target.clone())
        );
        assert!(target.exists());

        let confirmed = UninstallOptions {
            confirm: true,
            dry_run: false,
        };
        assert_eq!(
            uninstall(dir, confirmed, never).unwrap(),
            Outcome::Done(target.clone())
        );
        assert!(!target.exists());
    }

    #[test]
    fn test_yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
