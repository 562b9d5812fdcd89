//! A plugin chain DNS server core.
//!
//! This crate provides the parts of an authoritative DNS server that sit
//! between the network and the data: routing queries through ordered
//! chains of plugins, serving zones synthesized from a live service
//! registry, streaming those zones to secondaries and replacing the whole
//! configuration at runtime without dropping service.
//!
//! # Modules
//!
//! * [base] contains the DNS data types the rest of the crate speaks: domain
//!   names, records, serials and request and response messages.
//! * [source] defines the [`RecordSource`][source::RecordSource] trait
//!   through which zone data is obtained and provides an implementation
//!   synthesizing records from services and their endpoints.
//! * [zonetree] keeps the origins a server is authoritative for and the
//!   serial bookkeeping needed to classify transfer requests.
//! * [xfr] implements the transfer engine producing AXFR and IXFR record
//!   streams under an access policy.
//! * [chain] contains the plugin node trait, the registry creating nodes
//!   from configuration directives and the dispatcher walking the chains.
//! * [plugins] provides the built-in plugins.
//! * [config] holds the configuration model and its sources.
//! * [reload] swaps configuration generations at runtime.
//! * [logging] sets up the tracing subscriber.

pub mod base;
pub mod chain;
pub mod config;
pub mod logging;
pub mod plugins;
pub mod reload;
pub mod source;
pub mod xfr;
pub mod zonetree;
