#![cfg_attr(docsrs, feature(doc_cfg))]

//! Library components for the inetsvc service shim.
//!
//! # Overview
//! This crate lets a long-running network daemon be supervised by the
//! operating system's service manager. It exposes:
//! - [`reporter::StatusReporter`]: owns the reported status and its
//!   checkpoint counter.
//! - [`dispatcher::ControlDispatcher`]: applies control requests to the
//!   lifecycle state machine.
//! - [`lifecycle`]: the startup and shutdown sequence around the daemon.
//! - [`installer`]: registration and removal of the service.
//! - [`debug`]: foreground execution driven by console interrupts.
//!
//! # Examples
//! ```rust,no_run
//! use inetsvc::config::Config;
//!
//! let cfg = Config::load(None).expect("configuration must be valid");
//! println!("service: {}", cfg.service_name);
//! ```
pub mod app;
pub mod args;
pub mod cli;
pub mod config;
pub mod console;
pub mod daemon;
pub mod debug;
pub mod dispatcher;
pub mod installer;
pub mod lifecycle;
pub mod logging;
pub mod platform;
pub mod reporter;
