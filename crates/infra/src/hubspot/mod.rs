//! HubSpot CRM adapter.

pub mod client;
mod dto;

pub use client::HubSpotPortal;
