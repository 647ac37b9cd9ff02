//! Reactor Core: registration table + event loop + dispatch
//!
//! Prinsip desain:
//! - Satu loop thread, tidak ada thread pool
//! - Satu mutex untuk registration table; tidak pernah di-hold selama
//!   blocking wait atau selama callback jalan
//! - Wait-set selalu diturunkan dari table, tidak pernah di-maintain
//!   sebagai koleksi kedua - jadi tidak mungkin out of sync
//! - Error dari satu koneksi tidak pernah mematikan loop

mod dispatch;
mod event_loop;
mod table;

pub use event_loop::Reactor;

use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use thiserror::Error;

use crate::network::Endpoint;

/// Callback untuk satu readiness condition.
///
/// Callback dapat `&mut Endpoint` selama call berlangsung saja, tidak
/// pernah ownership. Error return di-log di dispatch seam dan tidak
/// propagate ke loop.
pub type EventCallback = Arc<dyn Fn(&mut Endpoint) -> io::Result<()> + Send + Sync>;

/// Satu set callback, per-socket atau sebagai process-wide default.
///
/// Slot `None` pada per-socket set berarti "pakai default untuk kondisi
/// itu"; `None` pada default berarti kondisinya di-ignore.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_readable: Option<EventCallback>,
    pub on_writable: Option<EventCallback>,
    pub on_closed: Option<EventCallback>,
}

impl Callbacks {
    /// Registration tanpa per-socket callback sama sekali.
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, kind: CallbackKind) -> Option<EventCallback> {
        match kind {
            CallbackKind::Readable => self.on_readable.clone(),
            CallbackKind::Writable => self.on_writable.clone(),
            CallbackKind::Closed => self.on_closed.clone(),
        }
    }

    pub(crate) fn set(&mut self, kind: CallbackKind, callback: Option<EventCallback>) {
        match kind {
            CallbackKind::Readable => self.on_readable = callback,
            CallbackKind::Writable => self.on_writable = callback,
            CallbackKind::Closed => self.on_closed = callback,
        }
    }
}

/// Kondisi yang bisa punya default callback sendiri.
///
/// Tiap kondisi resolve ke default-nya masing-masing, tidak ada
/// cross-wiring readable/writable/closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Readable,
    Writable,
    Closed,
}

/// Setup error: satu-satunya jenis error yang sampai ke caller.
///
/// Error transient (wait gagal, koneksi putus, callback gagal) di-log dan
/// ditangani di dalam loop, tidak pernah lewat sini.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("descriptor {0} is already registered")]
    AlreadyRegistered(RawFd),

    #[error("failed to arm readiness handle: {0}")]
    Arm(#[source] io::Error),

    #[error("readiness provider setup failed: {0}")]
    Setup(#[source] io::Error),
}
