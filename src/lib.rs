//! breezebee: plugin-driven environmental sampling agent
//!
//! The agent reads a set of sensor plugins on a fixed interval, hands each
//! record to every output plugin, raises one-shot alerts through notification
//! plugins and reflects the outcome of every cycle on two indicator lights.
//!
//! ## Modules
//!
//! * `config`: TOML configuration, validated with the `validator` crate:
//!   the `[main]` sampling settings, logger settings and the three plugin
//!   groups.
//!
//! * `core`: Runtime components:
//!   - Plugin registry, loader and the built-in plugins
//!   - Connectivity probe for plugins that need the network
//!   - Sampling scheduler, aggregator and output dispatch
//!   - Indicator state machine
//!
//! * `logger`: Centralized logging initialization using `tracing`.
//!   Supports console output in multiple formats (compact, pretty, JSON),
//!   a log file and optional systemd journald integration.

pub mod config;
pub mod core;
pub mod logger;
