//! mio-backed readiness provider
//!
//! epoll/kqueue lewat `mio::Poll`. Satu wake-up dari OS bisa bawa banyak
//! event sekaligus, tapi kontrak provider cuma satu fired index per wait
//! call - sisanya di-buffer di backlog dan di-replay di wait call
//! berikutnya, jadi tidak ada event yang hilang walau backend-nya
//! edge-triggered.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use mio::event::Event;
use mio::{Events, Poll, Registry, Token};

use super::{ArmHandle, Conditions, ReadinessProvider, WaitOutcome};
use crate::network::Endpoint;

const EVENTS_CAPACITY: usize = 1024;

/// Snapshot readiness flags dari satu mio event.
#[derive(Debug, Clone, Copy)]
struct FiredEvent {
    token: Token,
    readable: bool,
    writable: bool,
    read_closed: bool,
    error: bool,
    /// Berapa kali event ini di-scan tanpa ketemu di wait-set.
    misses: u8,
}

impl FiredEvent {
    fn from_event(event: &Event) -> Self {
        Self {
            token: event.token(),
            readable: event.is_readable(),
            writable: event.is_writable(),
            read_closed: event.is_read_closed(),
            error: event.is_error(),
            misses: 0,
        }
    }
}

/// Arm/disarm lewat clone dari poll registry - aman dari thread mana saja,
/// tidak perlu nunggu poll call selesai.
pub struct MioArmer {
    registry: Registry,
}

impl ArmHandle for MioArmer {
    fn arm(&self, endpoint: &mut Endpoint, token: Token) -> io::Result<()> {
        let interest = endpoint.interest();
        self.registry.register(endpoint, token, interest)
    }

    fn disarm(&self, endpoint: &mut Endpoint) -> io::Result<()> {
        self.registry.deregister(endpoint)
    }
}

/// Default readiness provider di atas `mio::Poll`.
pub struct MioPoller {
    poll: Poll,
    events: Events,
    /// Event yang sudah diterima dari OS tapi belum di-deliver.
    backlog: VecDeque<FiredEvent>,
    /// Event yang barusan di-deliver, dipakai oleh `query`.
    current: Option<FiredEvent>,
    armer: Arc<MioArmer>,
}

impl MioPoller {
    pub fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            backlog: VecDeque::new(),
            current: None,
            armer: Arc::new(MioArmer { registry }),
        })
    }

    /// Pop event backlog pertama yang ada di wait-set.
    ///
    /// Satu miss masih bisa berarti race dengan register yang baru saja
    /// jalan (snapshot wait-set-nya belum memuat token itu); dua miss
    /// berarti registration-nya sudah dilepas dan event-nya di-drop.
    /// Token tidak pernah di-reuse jadi drop tidak mungkin salah sasaran.
    fn next_from_backlog(&mut self, wait_set: &[Token]) -> Option<(usize, FiredEvent)> {
        for _ in 0..self.backlog.len() {
            let Some(mut event) = self.backlog.pop_front() else {
                break;
            };
            if let Some(index) = wait_set.iter().position(|token| *token == event.token) {
                return Some((index, event));
            }
            event.misses += 1;
            if event.misses < 2 {
                self.backlog.push_back(event);
            }
        }
        None
    }
}

impl ReadinessProvider for MioPoller {
    fn arm_handle(&self) -> Arc<dyn ArmHandle> {
        self.armer.clone()
    }

    fn wait(&mut self, wait_set: &[Token], timeout: Duration) -> io::Result<WaitOutcome> {
        // Sisa wake-up sebelumnya dulu, sebelum nanya OS lagi
        if let Some((index, event)) = self.next_from_backlog(wait_set) {
            self.current = Some(event);
            return Ok(WaitOutcome::Fired(index));
        }

        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                return Ok(WaitOutcome::TimedOut);
            }
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            self.backlog.push_back(FiredEvent::from_event(event));
        }

        match self.next_from_backlog(wait_set) {
            Some((index, event)) => {
                self.current = Some(event);
                Ok(WaitOutcome::Fired(index))
            }
            None => Ok(WaitOutcome::TimedOut),
        }
    }

    fn query(&mut self, endpoint: &Endpoint) -> io::Result<Conditions> {
        let event = match self.current.take() {
            Some(event) => event,
            None => return Ok(Conditions::default()),
        };

        let error_code = match endpoint.take_error()? {
            Some(err) => err.raw_os_error().unwrap_or(0),
            None => 0,
        };

        let mut conditions = Conditions {
            error_code,
            ..Conditions::default()
        };

        if endpoint.is_listener() {
            // Readable pada listener berarti ada koneksi di backlog
            conditions.accept = event.readable;
        } else {
            conditions.readable = event.readable;
            conditions.writable = event.writable;
            conditions.closed = event.read_closed;
        }

        // EPOLLERR tanpa SO_ERROR: anggap closed supaya tetap di-teardown
        if event.error && error_code == 0 {
            conditions.closed = true;
        }

        Ok(conditions)
    }
}
