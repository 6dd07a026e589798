//! milaapd — Lost-and-found matching daemon.
//!
//! Hosts the match API over HTTP/JSON for kiosk clients: report a sighting,
//! match a captured face descriptor against the stored population, list
//! cases by status, and drive a case through the reunification lifecycle.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod service;
