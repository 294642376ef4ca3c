//! Matzip Core - Shared types library.
//!
//! This crate provides the types shared by every Matzip component:
//! - `server` - JSON API in front of the hosted backend
//! - `cli` - Operator tools for inspecting the catalog
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Everything that talks to the backend lives in `matzip-server`.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, ratings
//! - [`hours`] - Business-hours evaluation in Korea Standard Time
//! - [`views`] - Display-ready restaurant, review and profile shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod hours;
pub mod types;
pub mod views;

pub use types::*;
pub use views::*;
