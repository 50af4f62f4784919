//! Core of the comic archive converter: options, errors, plugin traits,
//! page collection and the batch pipeline.

pub mod collect;
pub mod error;
pub mod event;
pub mod options;
pub mod pipeline;
pub mod plugin;
