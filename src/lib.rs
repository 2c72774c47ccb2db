// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declarative deployment of jobs, clusters, and libraries to a remote
//! analytics workspace.
//!
//! Brickyard takes settings documents declared next to a project, fills them
//! in with defaults derived from the project itself, validates them, and then
//! reconciles the live state of the remote control plane against them through
//! its REST API.
//!
//! # Pipeline
//!
//! Every operation runs through the same stages:
//!
//! 1. __Load__: render a settings file through a [`TemplateRenderer`] and
//!    deserialize one or more documents out of it.
//! 2. __Merge__: fill empty fields from a [`DefaultsProvider`] and synthesize
//!    project-derived fields (resource name, team tag).
//! 3. __Validate__: check naming and required fields against the project.
//! 4. __Reconcile__: resolve remote ids by name, then create, update, or
//!    control the remote resources.
//!
//! [`TemplateRenderer`]: crate::settings::template::TemplateRenderer
//! [`DefaultsProvider`]: crate::merge::defaults::DefaultsProvider

pub mod cluster;
pub mod config;
pub mod context;
pub mod converge;
pub mod job;
pub mod library;
pub mod lifecycle;
pub mod merge;
pub mod path;
pub mod remote;
pub mod resolve;
pub mod settings;
pub mod transfer;
pub mod validate;
pub mod workspace;
