// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the files Brickyard reads and writes
//! between invocations.

use std::path::PathBuf;

/// Determine default absolute path to the tool configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/brickyard/config.toml` as
/// the default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("brickyard").join("config.toml"))
        .ok_or(NoConfigHome)
}

/// Determine default path to the persisted environment context.
///
/// The context is written at build time and read back by detached runs, so
/// it lives beside the build output of the invoking project rather than in a
/// per-user directory.
pub fn default_context_file() -> PathBuf {
    PathBuf::from("target").join("brickyard").join("environment.json")
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigHome;

/// Friendly result alias :3
pub type Result<T, E = NoConfigHome> = std::result::Result<T, E>;
