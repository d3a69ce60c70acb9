//! Staff calendar library
//!
//! Loads staff calendar events per month window through a stale-while-
//! revalidate cache and submits invitation responses to the HR backend.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod refresh;
