//! Nightjar - Gemini and nimigem server
//!
//! Core library for the protocol, the CGI gateway and the TLS listener.

pub mod cgi;
pub mod config;
pub mod gemini;
pub mod handlers;
pub mod server;
