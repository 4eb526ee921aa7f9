use dirs::home_dir;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Version reported by an agent CLI installation, for preference ranking.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct AgentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AgentVersion {
    /// Parses the first `major.minor.patch` triple found in version output,
    /// e.g. `1.0.24 (Claude Code)` or `claude version: 2.3.4-beta`.
    pub fn from_output(output: &str) -> Option<Self> {
        output.split_whitespace().find_map(Self::from_token)
    }

    fn from_token(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let major = segments.next()?.parse::<u32>().ok()?;
        let minor = segments.next()?.parse::<u32>().ok()?;
        let patch_segment = segments.next()?;
        let digits: String = patch_segment
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return None;
        }
        let patch = digits.parse::<u32>().ok()?;
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentInstallation {
    pub path: PathBuf,
    pub version: Option<AgentVersion>,
}

#[derive(Debug, Error)]
pub enum ResolveAgentBinaryError {
    #[error("agent binary `{0}` not found on PATH or in well-known locations")]
    NotFound(String),
}

/// Environment override consulted before any discovery.
pub const AGENT_BIN_ENV: &str = "CCDRIVE_AGENT_BIN";

/// Resolves the agent binary to spawn: env override first, then the highest
/// versioned discovered installation.
pub fn resolve_agent_binary(binary_name: &str) -> Result<PathBuf, ResolveAgentBinaryError> {
    if let Some(override_bin) = env::var_os(AGENT_BIN_ENV) {
        return Ok(PathBuf::from(override_bin));
    }

    let path_var = env::var("PATH").unwrap_or_default();
    let installations = discover_installations(binary_name, home_dir().as_deref(), &path_var);
    installations
        .into_iter()
        .max_by_key(|installation| installation.version)
        .map(|installation| installation.path)
        .ok_or_else(|| ResolveAgentBinaryError::NotFound(binary_name.to_string()))
}

/// Probes PATH entries and well-known install locations for executable
/// candidates, deduplicated by normalized path, each probed for its version.
pub fn discover_installations(
    binary_name: &str,
    home: Option<&Path>,
    path_var: &str,
) -> Vec<AgentInstallation> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut installations = Vec::new();

    for dir in candidate_dirs(home, path_var) {
        let candidate = dir.join(binary_name);
        if !is_executable(&candidate) {
            continue;
        }
        if !seen.insert(normalize_path(&candidate.to_string_lossy())) {
            continue;
        }
        let version = probe_version(&candidate);
        installations.push(AgentInstallation {
            path: candidate,
            version,
        });
    }

    installations
}

fn candidate_dirs(home: Option<&Path>, path_var: &str) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = path_var
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect();

    if let Some(home) = home {
        dirs.push(home.join(".local").join("bin"));
        dirs.push(home.join("bin"));
        dirs.push(home.join(".claude").join("local"));
        dirs.extend(nvm_bin_dirs(home));
    }

    dirs.push(PathBuf::from("/usr/local/bin"));
    dirs.push(PathBuf::from("/opt/homebrew/bin"));
    dirs
}

fn nvm_bin_dirs(home: &Path) -> Vec<PathBuf> {
    let node_versions = home.join(".nvm").join("versions").join("node");
    let Ok(entries) = fs::read_dir(node_versions) else {
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path().join("bin"))
        .filter(|bin| bin.is_dir())
        .collect()
}

fn probe_version(path: &Path) -> Option<AgentVersion> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    AgentVersion::from_output(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Returns `path_var` with `dir` prepended unless an equivalent entry is
/// already present.
pub fn add_dir_to_path(path_var: &str, dir: &str) -> String {
    if path_contains_dir(path_var, dir) {
        return path_var.to_string();
    }
    if path_var.is_empty() {
        return dir.to_string();
    }
    format!("{dir}:{path_var}")
}

/// Drops repeated entries from a PATH string, keeping first-seen order.
pub fn deduplicate_path(path_var: &str) -> String {
    let mut seen = HashSet::new();
    let mut unique: Vec<&str> = Vec::new();

    for entry in path_var.split(':') {
        let normalized = normalize_path(entry);
        if !normalized.is_empty() && seen.insert(normalized) {
            unique.push(entry);
        }
    }

    unique.join(":")
}

fn path_contains_dir(path_var: &str, dir: &str) -> bool {
    let normalized_dir = normalize_path(dir);
    path_var
        .split(':')
        .map(normalize_path)
        .any(|entry| entry == normalized_dir)
}

/// Trailing slashes stripped; canonicalized when the path exists, so symlinked
/// duplicates compare equal.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match Path::new(trimmed).canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => trimmed.to_string(),
    }
}
