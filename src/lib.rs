//! # OAuth Gateway Library
//!
//! Runs the OAuth2 authorization code flow for configured third-party
//! integrations: redirects the user-agent to the provider, exchanges the
//! returned code for a token and hands the credentials to downstream handlers.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod models;
pub mod oauth_client;
pub mod server;
pub mod strategies;
pub mod telemetry;
