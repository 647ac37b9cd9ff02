//! Reactor event loop
//!
//! Siklus per iterasi: turunkan wait-set dari table -> blocking wait
//! dengan timeout -> resolve fired index ke registration -> query kondisi
//! detail -> dispatch. Table lock cuma di-hold untuk mutation/lookup,
//! tidak pernah selama wait atau selama callback.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mio::Token;
use tracing::{debug, info, warn};

use super::table::{Registration, SocketTable};
use super::{CallbackKind, Callbacks, EventCallback, ReactorError};
use crate::network::Endpoint;
use crate::readiness::{ArmHandle, MioPoller, ReadinessProvider, WaitOutcome};

/// Timeout satu wait call - sekaligus upper bound latency untuk `stop()`.
const WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sleep singkat saat belum ada socket terdaftar, supaya loop tidak
/// busy-spin.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

pub(crate) struct Shared {
    pub(crate) table: Mutex<SocketTable>,
    pub(crate) defaults: Mutex<Callbacks>,
    pub(crate) armer: Arc<dyn ArmHandle>,
    running: AtomicBool,
    /// Waiting half dari provider; diambil oleh thread yang menang klaim
    /// `run()` dan dikembalikan saat loop berhenti.
    waiter: Mutex<Option<Box<dyn ReadinessProvider>>>,
    next_token: AtomicUsize,
}

/// Handle ke reactor. Clone-able dan murah; semua clone menunjuk state
/// yang sama, jadi `stop()` atau `register()` boleh dari thread mana pun.
#[derive(Clone)]
pub struct Reactor {
    pub(crate) shared: Arc<Shared>,
}

impl Reactor {
    /// Reactor dengan provider default (mio poll). Setup sekali per
    /// reactor; gagal di sini berarti OS facility-nya tidak tersedia.
    pub fn new() -> Result<Self, ReactorError> {
        let poller = MioPoller::new().map_err(ReactorError::Setup)?;
        Ok(Self::with_provider(Box::new(poller)))
    }

    /// Reactor di atas provider lain - primitive apa pun yang memenuhi
    /// kontrak [`ReadinessProvider`].
    pub fn with_provider(provider: Box<dyn ReadinessProvider>) -> Self {
        let armer = provider.arm_handle();
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(SocketTable::new()),
                defaults: Mutex::new(Callbacks::none()),
                armer,
                running: AtomicBool::new(false),
                waiter: Mutex::new(Some(provider)),
                next_token: AtomicUsize::new(0),
            }),
        }
    }

    /// Daftarkan endpoint ke reactor.
    ///
    /// Slot `None` di `callbacks` fallback ke process-wide default untuk
    /// kondisi itu. Descriptor yang sudah terdaftar ditolak. Kalau arming
    /// gagal, tidak ada yang tersisa: table tidak berubah dan endpoint
    /// (termasuk socket-nya) dilepas.
    pub fn register(&self, endpoint: Endpoint, callbacks: Callbacks) -> Result<Token, ReactorError> {
        let fd = endpoint.raw_fd();
        let mut table = self.shared.table.lock().unwrap();

        if table.contains_fd(fd) {
            return Err(ReactorError::AlreadyRegistered(fd));
        }

        let token = Token(self.shared.next_token.fetch_add(1, Ordering::Relaxed));
        let mut endpoint = endpoint;
        self.shared
            .armer
            .arm(&mut endpoint, token)
            .map_err(ReactorError::Arm)?;

        table.insert(Registration {
            fd,
            token,
            endpoint: Arc::new(Mutex::new(endpoint)),
            callbacks,
        })?;

        debug!("registered fd {} as {:?}", fd, token);
        Ok(token)
    }

    /// Lepas satu descriptor. No-op kalau tidak terdaftar.
    ///
    /// Registration langsung hilang dari table (dan dari wait-set
    /// berikutnya). Disarm terjadi sekarang kalau endpoint-nya tidak
    /// sedang dipakai callback; kalau sedang, loop yang disarm setelah
    /// dispatch selesai. Socket tertutup saat reference terakhir lepas.
    pub fn deregister(&self, fd: RawFd) {
        let removed = self.shared.table.lock().unwrap().remove_by_fd(fd);
        let Some(registration) = removed else {
            return;
        };

        // try_lock: deregister dari dalam callback socket itu sendiri
        // tidak boleh deadlock
        if let Ok(mut endpoint) = registration.endpoint.try_lock() {
            if let Err(e) = self.shared.armer.disarm(&mut endpoint) {
                debug!("disarm failed for fd {}: {}", fd, e);
            }
        }

        debug!("deregistered fd {}", fd);
    }

    /// Ganti satu process-wide default callback. Berlaku mulai dispatch
    /// berikutnya, termasuk untuk socket yang sudah terdaftar.
    pub fn set_default(&self, kind: CallbackKind, callback: EventCallback) {
        self.shared.defaults.lock().unwrap().set(kind, Some(callback));
    }

    /// Minta loop berhenti. Advisory: loop cek flag ini di awal iterasi,
    /// jadi paling lama satu wait timeout sebelum benar-benar berhenti.
    /// Idempotent, boleh dari thread mana pun.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.shared.table.lock().unwrap().contains_fd(fd)
    }

    pub fn registered_count(&self) -> usize {
        self.shared.table.lock().unwrap().len()
    }

    /// Jalankan loop di thread pemanggil sampai `stop()`.
    ///
    /// Idempotent: kalau sudah ada loop yang jalan, call kedua langsung
    /// return tanpa bikin loop kedua.
    pub fn run(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let taken = self.shared.waiter.lock().unwrap().take();
        let Some(mut waiter) = taken else {
            // Restart race: loop sebelumnya belum selesai mengembalikan
            // provider-nya
            self.shared.running.store(false, Ordering::SeqCst);
            debug!("run() lost provider hand-back race, returning");
            return;
        };

        info!("reactor loop started");
        while self.shared.running.load(Ordering::SeqCst) {
            self.iterate(waiter.as_mut());
        }
        *self.shared.waiter.lock().unwrap() = Some(waiter);
        info!("reactor loop stopped");
    }

    /// Satu iterasi loop: wait lalu dispatch paling banyak satu descriptor.
    fn iterate(&self, waiter: &mut dyn ReadinessProvider) {
        let wait_set = self.shared.table.lock().unwrap().wait_set();
        if wait_set.is_empty() {
            thread::sleep(IDLE_SLEEP);
            return;
        }

        let index = match waiter.wait(&wait_set, WAIT_TIMEOUT) {
            Ok(WaitOutcome::Fired(index)) => index,
            Ok(WaitOutcome::TimedOut) => return,
            Err(e) => {
                // Best effort: satu wait gagal bukan alasan berhenti serve
                warn!("readiness wait failed: {}", e);
                return;
            }
        };

        let Some(&token) = wait_set.get(index) else {
            warn!("provider fired index {} outside wait-set", index);
            return;
        };

        let registration = {
            let table = self.shared.table.lock().unwrap();
            table.find_by_token(token).cloned()
        };
        let Some(registration) = registration else {
            // Race dengan deregister dari thread lain; skip saja
            return;
        };

        let mut endpoint = registration.endpoint.lock().unwrap();
        let conditions = match waiter.query(&endpoint) {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!("condition query failed for fd {}: {}", registration.fd, e);
                return;
            }
        };

        self.dispatch(&registration, &mut endpoint, conditions);

        // Deregister dari dalam callback menunda disarm sampai sini,
        // saat endpoint lock masih kita pegang
        if !self.shared.table.lock().unwrap().contains_token(token) {
            if let Err(e) = self.shared.armer.disarm(&mut endpoint) {
                debug!("post-dispatch disarm failed for fd {}: {}", registration.fd, e);
            }
        }
    }
}
