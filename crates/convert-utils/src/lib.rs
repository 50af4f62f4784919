//! Shared helpers: ZIP packing, XML generation, natural ordering, media types.

pub mod archive;
pub mod fs;
pub mod mime;
pub mod natural;
pub mod xml;
