#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod db;
mod error;
mod format;
mod generator;
mod registry;
mod schema;

pub use crate::config::*;
pub use crate::db::*;
pub use crate::error::*;
pub use crate::format::*;
pub use crate::generator::*;
pub use crate::registry::*;
pub use crate::schema::*;
