//! Discord bot that tracks per-member hit points and renders them as hearts.
//!
//! Interactions arrive over HTTP ([`api`]), are parsed and gated by
//! [`commands`] and [`access`], adjust rows through [`hp`] and [`db`], and are
//! formatted by [`render`] and [`paginate`].

pub mod access;
pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord;
pub mod hp;
pub mod metrics;
pub mod paginate;
pub mod render;
