use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Names the CLI under test: a native executable or a `.jar`
pub const CLI_ENV_VAR: &str = "RAWHTTP_CLI";

/// Build outputs tried, relative to the working directory, when
/// [`CLI_ENV_VAR`] is unset
pub const JAR_GUESSES: [&str; 2] = [
    "./rawhttp-cli/build/libs/rawhttp.jar",
    "../rawhttp-cli/build/libs/rawhttp.jar",
];

/// Name looked up on `PATH` as the last resort
pub const CLI_BINARY_NAME: &str = "rawhttp";

/// The argv prefix every launch of the CLI under test starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliExecutable {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl CliExecutable {
    pub fn native(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// `<java> -jar <jar>`
    pub fn jar(java: impl Into<PathBuf>, jar: &Path) -> Self {
        Self {
            program: java.into(),
            prefix_args: vec!["-jar".to_string(), jar.display().to_string()],
        }
    }

    pub fn with_prefix(program: impl Into<PathBuf>, prefix_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn prefix_args(&self) -> &[String] {
        &self.prefix_args
    }

    /// Full argv after the program: prefix followed by `args`
    pub fn argv<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        self.prefix_args
            .iter()
            .cloned()
            .chain(args.iter().map(|a| a.as_ref().to_string()))
            .collect()
    }

    /// Command line for display, arguments separated by spaces
    pub fn command_line<S: AsRef<str>>(&self, args: &[S]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.argv(args))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CliExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line::<&str>(&[]))
    }
}

/// Resolves where the CLI under test lives
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    working_dir: PathBuf,
    configured: Option<PathBuf>,
    java_home: Option<PathBuf>,
    search_path: bool,
}

impl ExecutableLocator {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            configured: None,
            java_home: None,
            search_path: false,
        }
    }

    /// Locator seeded from `RAWHTTP_CLI`, `JAVA_HOME` and the working directory
    pub fn from_env() -> Result<Self> {
        let working_dir = env::current_dir()
            .map_err(|e| HarnessError::io_error("reading the working directory", e))?;
        let mut locator = Self::new(working_dir).search_path(true);
        if let Some(path) = env::var_os(CLI_ENV_VAR).filter(|v| !v.is_empty()) {
            locator = locator.configured(path);
        }
        if let Some(home) = env::var_os("JAVA_HOME").filter(|v| !v.is_empty()) {
            locator = locator.java_home(home);
        }
        Ok(locator)
    }

    pub fn configured(mut self, path: impl Into<PathBuf>) -> Self {
        self.configured = Some(path.into());
        self
    }

    pub fn java_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(home.into());
        self
    }

    pub fn search_path(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    pub fn locate(&self) -> Result<CliExecutable> {
        if let Some(configured) = &self.configured {
            let path = self.working_dir.join(configured);
            if !path.is_file() {
                return Err(HarnessError::executable_not_found(path));
            }
            return self.launcher_for(&path);
        }

        let guesses: Vec<PathBuf> = JAR_GUESSES
            .iter()
            .map(|guess| normalize(&self.working_dir.join(guess)))
            .collect();
        if let Some(found) = guesses.iter().find(|p| p.is_file()) {
            tracing::debug!(path = %found.display(), "Found CLI build output");
            return self.launcher_for(found);
        }

        if self.search_path {
            if let Ok(found) = which::which(CLI_BINARY_NAME) {
                tracing::debug!(path = %found.display(), "Found CLI on PATH");
                return self.launcher_for(&found);
            }
        }

        Err(HarnessError::ExecutableNotConfigured {
            variable: CLI_ENV_VAR.to_string(),
            searched: guesses,
        })
    }

    fn launcher_for(&self, path: &Path) -> Result<CliExecutable> {
        let is_jar = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));

        if is_jar {
            let java = self.java()?;
            return Ok(CliExecutable::jar(java, path));
        }

        if !is_executable(path) {
            return Err(HarnessError::not_executable(path));
        }
        Ok(CliExecutable::native(path))
    }

    fn java(&self) -> Result<PathBuf> {
        match &self.java_home {
            Some(home) => {
                let java = home.join("bin").join(java_binary_name());
                if is_executable(&java) {
                    Ok(java)
                } else {
                    Err(HarnessError::not_executable(java))
                }
            }
            None => which::which("java").map_err(|_| HarnessError::not_executable("java")),
        }
    }
}

fn java_binary_name() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Resolves `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub(crate) fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
