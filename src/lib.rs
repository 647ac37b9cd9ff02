//! Argus - Event-Driven Socket Reactor
//!
//! Satu loop thread untuk banyak koneksi:
//! - Non-blocking I/O: readiness via epoll/kqueue (mio)
//! - Callback dispatch: per-socket handler atau process-wide default
//! - Single lock: registration table di-guard satu mutex, tidak pernah
//!   di-hold selama wait atau selama callback jalan
//!
//! Entry point adalah [`Reactor`]: register socket (listener atau stream),
//! set default callbacks, lalu `run()` di satu thread. `register`,
//! `deregister`, `set_default` dan `stop` boleh dipanggil dari thread lain
//! atau dari dalam callback.
//!
//! Untuk contoh pemakaian, lihat src/bin/echo_server.rs.

pub mod network;
pub mod reactor;
pub mod readiness;

pub use network::Endpoint;
pub use reactor::{CallbackKind, Callbacks, EventCallback, Reactor, ReactorError};
pub use readiness::{ArmHandle, Conditions, MioPoller, ReadinessProvider, WaitOutcome};

// Readiness handle yang dipakai di seluruh public API
pub use mio::Token;
