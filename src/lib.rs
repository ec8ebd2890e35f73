//! Dokkan Sync: mirrors Dokkan Battle card pages from the community wiki into SQLite
//!
//! A run has three passes:
//!
//! 1. **Discovery** -- List every card page across the rarity categories. In update
//!    mode the list is narrowed to titles missing from the database plus titles
//!    edited inside the recent-changes window
//! 2. **Sync** -- Fetch and parse pages in concurrent batches, then upsert the
//!    resulting records one at a time
//! 3. **Schedule** -- Rebuild the upcoming-releases table from its wiki page
//!
//! The SQLite file is shared with the bot that serves the data; tables this crate
//! does not own are left alone.
//!
//! # Key Modules
//!
//! - [`content`] -- Wiki-markup cleanup and link extraction
//! - [`fields`] -- Template field lookup with alias priority
//! - [`card`] -- Card page parsing (types, rarity, stats, skills, EZA)
//! - [`wiki`] -- MediaWiki API client behind the [`wiki::WikiSource`] trait
//! - [`discovery`] -- Category and recent-changes title discovery
//! - [`store`] -- SQLite schema, upserts and read queries
//! - [`schedule`] -- Upcoming-releases scraper
//! - [`sync`] -- Batch orchestration and the run report
//! - [`models`] -- Core data types (Card, ScheduleEntry, SyncMode)
//! - [`stats`] -- Atomic outcome counters
//! - [`error`] -- Wiki and per-card error types
//! - [`config`] -- Constants and runtime settings

pub mod card;
pub mod config;
pub mod content;
pub mod discovery;
pub mod error;
pub mod fields;
pub mod models;
pub mod schedule;
pub mod stats;
pub mod store;
pub mod sync;
pub mod wiki;
