pub mod accounts;
pub mod adapters;
pub mod config;
pub mod error;
pub mod security;
pub mod telemetry;
pub mod validation;
pub mod web;
