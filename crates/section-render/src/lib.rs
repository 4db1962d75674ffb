//! section-render — fetch server-rendered HTML sections and patch them into a
//! live document without a full page reload.

pub mod client;
pub mod config;
pub mod document;
pub mod patch;
pub mod types;

pub use client::SectionClient;
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use document::{compile_selector, FetchedSection, LivePage};
pub use patch::patch_elements;
pub use types::*;
