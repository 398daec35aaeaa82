//! graphgate - an authenticated HTTP gateway for Cypher statements
//!
//! One endpoint, `POST /api/proxy`, runs a single parameterized statement
//! or an ordered batch against a graph database and answers in JSON.

pub mod cli;
pub mod config;
pub mod driver;
pub mod gateway;
pub mod http_server;
pub mod observability;
