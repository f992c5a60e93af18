//! # siteforge
//!
//! Asset build pipeline for static sites built with an external generator
//! (Jekyll by default). It compiles SCSS into one prefixed, minified
//! stylesheet, copies scripts, copies or re-encodes images, runs the
//! generator, serves the result locally, rebuilds on change and publishes the
//! generated site to a hosting branch.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─ styles  (_dev/src/sass → assets/css) ─┐
//! CLI ─ build ────┼─ scripts (_dev/src/js   → assets/js)  ─┼─ barrier ─ generator (→ _site/)
//!                 └─ images  (_dev/src/img  → assets/img) ─┘
//!
//! server  ─ _site/ over HTTP
//! watch   ─ change ─ route to group ─ debounce ─ re-run that group
//! deploy  ─ build ─ force-push _site/ to gh-pages
//! ```
//!
//! Everything a run needs is resolved once at startup into a
//! [`BuildContext`](registry::BuildContext): the project root, the merged
//! configuration, the build mode and the [`AssetRegistry`](registry::AssetRegistry)
//! of source groups. It is shared read-only by every component.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `siteforge.toml` loading, profiles, merging and validation |
//! | [`types`] | Build mode, asset kinds and group kinds |
//! | [`registry`] | Source groups, glob matching, change routing and the build context |
//! | [`pipeline`] | The styles, scripts and images pipelines, plus atomic writes |
//! | [`imaging`] | Pure-Rust resize and re-encode used by production image runs |
//! | [`cache`] | Content-addressed cache of production image encodings |
//! | [`generator`] | Runs the external site generator |
//! | [`orchestrator`] | Concurrent pipelines, barrier, generator and per-group run locks |
//! | [`server`] | Static dev server for the generated site |
//! | [`watch`] | File watcher with per-group debounce and coalescing |
//! | [`deploy`] | Force-push of the generated site to the hosting branch |
//! | [`output`] | Human-readable run output |
//!
//! # Design Decisions
//!
//! ## Pipelines Are Synchronous
//!
//! The pipelines are plain blocking functions over a `&BuildContext`. The
//! orchestrator moves them onto tokio's blocking pool and the image pipeline
//! fans out over rayon internally. This keeps each pipeline testable without
//! a runtime.
//!
//! ## Compute, Then Write
//!
//! Every pipeline produces all of its outputs in memory before the first
//! write, and each write goes through a temporary file and a rename. A syntax
//! error in one stylesheet, or one corrupt image, leaves the previous outputs
//! in place instead of half a directory.
//!
//! ## Build Mode Is Fixed Per Process
//!
//! Development copies images verbatim; production bounds their width and
//! re-encodes them. The mode is chosen by `--env` at startup and never flips
//! mid-run, so the watcher cannot mix modes.

pub mod cache;
pub mod config;
pub mod deploy;
pub mod generator;
pub mod imaging;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
