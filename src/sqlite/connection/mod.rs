mod core;
mod dml;
mod functions;
mod select;
mod tx;

pub(crate) use self::core::ConnectionState;
pub use self::core::Connection;
