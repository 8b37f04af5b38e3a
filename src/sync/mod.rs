//! Synchronous Vertica client.

mod conn;
mod stream;

pub use conn::Conn;
pub use stream::Stream;
