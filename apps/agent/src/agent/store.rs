//! Plain-text credential store and proxy list.
//!
//! - tokens file: `token,identifier` per line
//! - credentials file: `identifier:password` per line
//! - proxy file: one proxy address per line

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::proxy::ProxyDescriptor;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} not found", .0.display())]
    Missing(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// A session token and the account it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub token: String,
    pub identifier: String,
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub identifier: String,
    pub password: String,
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::Missing(path.to_path_buf()),
        _ => LoadError::Read { path: path.to_path_buf(), source },
    })
}

/// Parse `token,identifier` lines.
///
/// Malformed lines are skipped. An identifier seen twice keeps its first token.
pub fn parse_tokens(contents: &str) -> Vec<TokenEntry> {
    let mut entries: Vec<TokenEntry> = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let [token, identifier] = parts.as_slice() else {
            warn!(line = number + 1, "Skipping malformed token line");
            continue;
        };
        if token.is_empty() || identifier.is_empty() {
            warn!(line = number + 1, "Skipping token line with empty field");
            continue;
        }

        if entries.iter().any(|e| e.identifier == *identifier) {
            warn!(line = number + 1, account = %identifier, "Duplicate account, keeping the first token");
            continue;
        }

        entries.push(TokenEntry { token: token.to_string(), identifier: identifier.to_string() });
    }

    entries
}

/// Parse `identifier:password` lines. The password may itself contain `:`.
pub fn parse_credentials(contents: &str) -> Vec<Credential> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(number, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match line.split_once(':') {
                Some((identifier, password)) if !identifier.is_empty() && !password.is_empty() => {
                    Some(Credential {
                        identifier: identifier.trim().to_string(),
                        password: password.to_string(),
                    })
                }
                _ => {
                    warn!(line = number + 1, "Skipping malformed credential line");
                    None
                }
            }
        })
        .collect()
}

pub fn parse_proxies(contents: &str) -> Vec<ProxyDescriptor> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ProxyDescriptor::new)
        .collect()
}

pub fn load_tokens(path: &Path) -> Result<Vec<TokenEntry>, LoadError> {
    read(path).map(|contents| parse_tokens(&contents))
}

pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, LoadError> {
    read(path).map(|contents| parse_credentials(&contents))
}

/// Load the proxy list. A missing file means "no proxies".
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyDescriptor>, LoadError> {
    match read(path) {
        Ok(contents) => Ok(parse_proxies(&contents)),
        Err(LoadError::Missing(path)) => {
            warn!("{} not found, running without proxies", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Append a `token,identifier` line, creating the file if needed.
pub fn append_token(path: &Path, token: &str, identifier: &str) -> Result<(), LoadError> {
    let write_err = |source| LoadError::Write { path: path.to_path_buf(), source };

    let mut file = OpenOptions::new().create(true).append(true).open(path).map_err(write_err)?;
    writeln!(file, "{token},{identifier}").map_err(write_err)
}
