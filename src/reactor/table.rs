//! Registration table
//!
//! Satu struktur untuk semua socket yang di-manage: `Vec<Registration>`.
//! Wait-set TIDAK disimpan terpisah - selalu diturunkan lewat `wait_set()`
//! tepat sebelum wait call, jadi table dan wait-set tidak mungkin beda
//! panjang atau beda urutan.

use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};

use mio::Token;

use super::{Callbacks, ReactorError};
use crate::network::Endpoint;

/// Satu socket yang di-manage reactor: descriptor, readiness handle,
/// endpoint, dan per-socket callbacks.
///
/// Descriptor dan token dibuat dan dilepas bersama; token tidak pernah
/// di-reuse setelah registration-nya hilang.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) fd: RawFd,
    pub(crate) token: Token,
    pub(crate) endpoint: Arc<Mutex<Endpoint>>,
    pub(crate) callbacks: Callbacks,
}

/// Ordered collection dari semua registration.
pub(crate) struct SocketTable {
    entries: Vec<Registration>,
}

impl SocketTable {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn contains_fd(&self, fd: RawFd) -> bool {
        self.entries.iter().any(|registration| registration.fd == fd)
    }

    pub(crate) fn contains_token(&self, token: Token) -> bool {
        self.entries.iter().any(|registration| registration.token == token)
    }

    /// Tambah registration. Descriptor yang sudah ada ditolak, table tidak
    /// berubah.
    pub(crate) fn insert(&mut self, registration: Registration) -> Result<(), ReactorError> {
        if self.contains_fd(registration.fd) {
            return Err(ReactorError::AlreadyRegistered(registration.fd));
        }
        self.entries.push(registration);
        Ok(())
    }

    /// Lepas registration by descriptor. `None` kalau tidak terdaftar -
    /// itu bukan error.
    pub(crate) fn remove_by_fd(&mut self, fd: RawFd) -> Option<Registration> {
        let index = self.entries.iter().position(|registration| registration.fd == fd)?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn find_by_token(&self, token: Token) -> Option<&Registration> {
        self.entries.iter().find(|registration| registration.token == token)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Wait-set untuk wait call berikutnya, diturunkan dari table saat ini.
    /// Element i selalu milik registration di posisi i.
    pub(crate) fn wait_set(&self) -> Vec<Token> {
        self.entries.iter().map(|registration| registration.token).collect()
    }
}
