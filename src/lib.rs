//! WishKart auth core.
//!
//! - [`auth`]: the Auth State Holder shared by every view in a process.
//! - [`guard`]: the per-request route guard for the web server.
//! - [`session_store`]: the hosted auth service behind both.
//! - [`data`]: profile and public-registry reads.

pub mod auth;
pub mod config;
pub mod data;
pub mod guard;
pub mod routes;
pub mod session_store;
pub mod state;
