//! # betabuild - Continuous Cross-Compilation Daemon
//!
//! betabuild watches an upstream git repository and, whenever a new commit
//! lands, compiles the project for a fixed matrix of OS/architecture pairs
//! and publishes the binaries into a per-version directory.
//!
//! ## Features
//!
//! - **Bounded Parallelism**: a rendezvous channel feeds a fixed worker pool
//! - **Exactly Once**: every target of the matrix is built at most once per run
//! - **Hardened Cancellation**: the first failure stops the remaining jobs
//! - **Restart Safe**: the last built commit is persisted in a marker file
//!
//! ## Quick Start
//!
//! ```bash
//! # Check git, the toolchain and the publish directory
//! betabuild doctor
//!
//! # Poll forever
//! betabuild run
//! ```
//!
//! ## Module Organization
//!
//! - [`target`] - The cross-compilation matrix
//! - [`build`] - Worker pool, build actions and the supervisor
//! - [`daemon`] - Change-detection loop
//! - [`repo`] - Git checkout management
//! - [`config`] - Configuration parsing (`betabuild.toml`)
//! - [`commands`] - CLI command handlers

/// Build dispatch: worker pool, actions, supervisor and reports.
pub mod build;

/// Cooperative cancellation tokens.
pub mod cancel;

/// CLI command handlers extracted from main.
pub mod commands;

/// Configuration file parsing (`betabuild.toml`).
pub mod config;

/// Poll, compare and rebuild loop.
pub mod daemon;

/// Persisted last-built commit.
pub mod marker;

/// Source repository access.
pub mod repo;

/// OS/architecture build matrix.
pub mod target;

/// Terminal UI utilities (tables, colors).
pub mod ui;
