//! # stockwatch
//!
//! Periodically re-checks Zara and Bershka product pages and tells
//! subscribers when sizes they want come back in stock.
//!
//! ## Architecture
//!
//! Every pass runs the same pipeline for each chat that has subscriptions:
//!
//! ```text
//! Store → WorkerPool (one browser per worker) → ResultStream → diff → Notifier
//! ```
//!
//! - [`checker`]: worker pool, chunking and the result stream
//! - [`scraper`]: Chrome sessions and per-brand page probers
//! - [`monitor`]: change detection and the per-pass consumer
//! - [`notify`]: bounded, fire-and-forget delivery
//! - [`store`]: SQLite persistence
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch sizes M and L of a shirt
//! stockwatch add https://www.zara.com/ua/uk/shirt-p123.html --user 42 --sizes M,L
//!
//! # See what a page looks like right now
//! stockwatch check https://www.zara.com/ua/uk/shirt-p123.html
//!
//! # Run forever, one pass a minute
//! STOCKWATCH_BOT_TOKEN=... stockwatch daemon start --interval 1m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// the configuration and the Chrome-backed monitor.
pub mod app;

/// Page checking seam and parallel worker pool.
///
/// - [`SessionFactory`](checker::SessionFactory) and [`Prober`](checker::Prober): browser-agnostic traits
/// - [`WorkerPool`](checker::WorkerPool): one session per worker, exactly one result per URL
/// - [`ResultStream`](checker::ResultStream): completion-order results with a typed end marker
pub mod checker;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/stockwatch/config.toml`.
pub mod config;

/// Background monitoring loop.
///
/// - `stockwatch daemon start` - Run passes at a fixed interval
/// - `stockwatch daemon stop` - Stop the daemon after its current pass
/// - `stockwatch daemon status` - Check if daemon is running
pub mod daemon;

/// Core domain models.
///
/// - [`Subscription`](domain::Subscription): one user watching one product page
/// - [`Brand`](domain::Brand): supported shops
/// - [`StatusBlock`](domain::StatusBlock) and [`available_sizes`](domain::available_sizes): the stored status text and how it is read back
pub mod domain;

pub mod monitor;

pub mod notify;

/// Headless Chrome via chromiumoxide.
pub mod scraper;

/// SQLite persistence layer.
///
/// - [`SubscriptionStore`](store::SubscriptionStore): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
