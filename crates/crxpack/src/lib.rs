#![forbid(unsafe_code)]

pub mod archive;
pub mod container;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod signing;

pub use container::{Container, ContainerError, FORMAT_VERSION, HEADER_SIZE, MAGIC, read_container};
pub use error::{PackError, Result};
pub use keys::{KeyFingerprint, KeyPair};
pub use pipeline::{KeygenOptions, PackOptions, PackOutcome, keygen, pack};
