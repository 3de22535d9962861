//! Sales Desk: rule-based handling of inbound security-document requests.

pub mod catalog;
pub mod config;
pub mod desk;
pub mod error;
pub mod intake;
pub mod pipeline;
pub mod server;
pub mod trust;
