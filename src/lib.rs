// Library root
// -----------
// Attaches segmentation outline masks to the well images of a screen in an
// imaging repository. The binary (`main.rs`) parses the command line and
// hands a connected client to `workflow::run`.
//
// Module responsibilities:
// - `api`: HTTP gateway client implementing `repository::Repository`.
// - `masks`: naming conventions mapping wells and fields to mask files.
// - `workflow`: discovery, per-well processing and upload & link.
// - `config`, `logging`, `ui`: configuration file, logger setup, prompts.
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod masks;
pub mod model;
pub mod repository;
pub mod ui;
pub mod workflow;

pub use error::{Error, Result};
