//! Network Layer: socket endpoint wrapper
//!
//! Menggunakan mio untuk cross-platform non-blocking I/O.
//! Reactor cuma melihat [`Endpoint`]; detail listener vs stream dan
//! socket tuning semua di sini.

mod endpoint;

pub use endpoint::Endpoint;
