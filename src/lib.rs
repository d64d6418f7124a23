// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manage Bundler's local gem overrides per project.
//!
//! Bundler can be told to load a gem from a local checkout instead of its
//! git source through `bundle config local.<gem> <path>`. That setting is
//! easy to forget about, and annoying to re-type every time you want to flip
//! between the local checkout and the real thing. Localctl remembers every
//! local override of a project in a small __registry file__ at the project
//! root, and keeps Bundler's settings store in sync with whatever the
//! registry says is turned on.
//!
//! # Layout
//!
//! - [`registry`] reads and writes the registry file.
//! - [`settings`] talks to Bundler's settings store.
//! - [`session`] ties the two together into the operations users run.
//! - [`command`] maps command names and aliases onto those operations.
//! - [`ignore_file`] keeps localctl's files out of version control.
//! - [`config`] and [`path`] figure out where everything lives.

pub mod command;
pub mod config;
pub mod ignore_file;
pub mod path;
pub mod registry;
pub mod session;
pub mod settings;
