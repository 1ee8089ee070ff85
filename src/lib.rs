mod buffer;
mod config;
mod decoder;
mod error;
pub mod netflow;
pub mod packet;
mod pool;
pub mod sflow;
mod value;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate tracing;

pub use buffer::Buffer;
pub use config::Config;
pub use decoder::Decoder;
pub use error::Error;
pub use pool::{Datagram, Pool, Sink};
pub use value::Value;
