//! Route handlers for Passgate.
//!
//! `auth` owns registration, login, logout and the request gate. The
//! remaining modules render pages on top of it.

pub mod auth;
pub mod health;
pub mod profile;
pub mod root;
