// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Library references.
//!
//! Libraries are referenced in one of several ways: by path to an archive,
//! or by coordinates in a package repository. Only path-addressed JAR
//! archives are ever reconciled. Other kinds are carried along as declared.

use serde::{Deserialize, Serialize};

/// File extension of archive libraries that can be reconciled.
pub const ARCHIVE_SUFFIX: &str = ".jar";

/// Reference to a single library.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Library {
    /// Path to a JAR archive.
    Jar(String),

    /// Path to a Python egg.
    Egg(String),

    /// Path to a Python wheel.
    Whl(String),

    /// Maven coordinates.
    Maven(MavenLibrary),

    /// PyPI package.
    Pypi(PypiLibrary),
}

impl Library {
    /// Path of archive library, if this is one.
    pub fn archive_path(&self) -> Option<&str> {
        match self {
            Self::Jar(path) => Some(path.as_str()),
            _ => None,
        }
    }

    /// Construct archive library reference.
    pub fn archive(path: impl Into<String>) -> Self {
        Self::Jar(path.into())
    }
}

/// Maven coordinates of a library.
#[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Deserialize, Serialize)]
pub struct MavenLibrary {
    /// Coordinates in `group:artifact:version` form.
    pub coordinates: String,

    /// Repository to resolve from instead of Maven Central.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Dependencies to leave out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
}

/// PyPI package reference.
#[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Deserialize, Serialize)]
pub struct PypiLibrary {
    /// Package name with optional version specifier.
    pub package: String,

    /// Index to resolve from instead of PyPI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// Check whether path names an archive library that can be reconciled.
pub fn is_archive_path(path: &str) -> bool {
    path.ends_with(ARCHIVE_SUFFIX)
}
