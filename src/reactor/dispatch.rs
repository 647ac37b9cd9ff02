//! Dispatch engine
//!
//! Satu fired descriptor bisa bawa beberapa kondisi sekaligus; urutan
//! proses selalu readable -> writable -> closed -> accept, jadi close yang
//! datang bareng data tetap diproses setelah read sempat jalan. Error
//! apa pun dari satu koneksi berhenti di sini - tidak pernah sampai ke
//! loop.

use std::io;

use tracing::{error, info, warn};

use super::event_loop::Reactor;
use super::table::Registration;
use super::{CallbackKind, Callbacks};
use crate::network::Endpoint;
use crate::readiness::Conditions;

impl Reactor {
    /// Proses semua kondisi aktif untuk satu fired registration.
    pub(crate) fn dispatch(
        &self,
        registration: &Registration,
        endpoint: &mut Endpoint,
        conditions: Conditions,
    ) {
        // Error code != 0 selalu teardown, tidak ada retry dan tidak ada
        // callback
        if conditions.error_code != 0 {
            error!(
                "fd {} failed with os error {}",
                registration.fd, conditions.error_code
            );
            self.deregister(registration.fd);
            return;
        }

        if conditions.readable {
            self.invoke(CallbackKind::Readable, registration, endpoint);
        }
        if conditions.writable {
            self.invoke(CallbackKind::Writable, registration, endpoint);
        }
        if conditions.closed {
            self.invoke(CallbackKind::Closed, registration, endpoint);
            // Close itu terminal, dengan atau tanpa callback
            self.deregister(registration.fd);
        }
        if conditions.accept {
            self.accept_pending(endpoint);
        }
    }

    /// Panggil per-socket callback untuk kondisi ini, atau default-nya.
    /// Callback error di-log di sini dan tidak propagate.
    fn invoke(&self, kind: CallbackKind, registration: &Registration, endpoint: &mut Endpoint) {
        let callback = registration
            .callbacks
            .get(kind)
            .or_else(|| self.shared.defaults.lock().unwrap().get(kind));
        let Some(callback) = callback else {
            return;
        };

        if let Err(e) = callback(endpoint) {
            warn!("{:?} callback failed on fd {}: {}", kind, registration.fd, e);
        }
    }

    /// Terima semua koneksi yang pending di backlog listener.
    ///
    /// Koneksi baru terdaftar tanpa per-socket callback - mereka pakai
    /// default yang berlaku saat mereka fired nanti. Accept yang gagal
    /// di-log; listener tetap terdaftar.
    fn accept_pending(&self, listener: &mut Endpoint) {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let endpoint = Endpoint::accepted(stream);
                    match self.register(endpoint, Callbacks::none()) {
                        Ok(token) => info!("accepted connection from {} as {:?}", peer, token),
                        Err(e) => {
                            warn!("failed to register accepted connection from {}: {}", peer, e)
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    break;
                }
            }
        }
    }
}
