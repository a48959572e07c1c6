use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::{
    channel::SmcChannel,
    config::SmcConfig,
    error::{Result, SmcError},
    iokit::IoKitChannel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

pub(crate) struct Session<C> {
    pub(crate) channel: C,
    pub(crate) state: ConnectionState,
}

/// A session with the controller.
///
/// Owns the channel handle and its open/closed state. Every transaction
/// and every state change takes the same lock, so at most one call is in
/// flight per `Smc` even when it is shared between threads. An open channel
/// is released when the `Smc` is dropped.
///
/// # Example
///
/// ```no_run
/// use smckit::connection::Smc;
///
/// let smc = Smc::open_default().unwrap();
/// println!("{} keys", smc.key_count().unwrap());
/// smc.close().unwrap();
/// ```
pub struct Smc<C: SmcChannel = IoKitChannel> {
    session: Mutex<Session<C>>,
    config: SmcConfig,
}

impl Smc<IoKitChannel> {
    /// Opens the `AppleSMC` service with default settings.
    pub fn open_default() -> Result<Self> {
        Self::open_with(SmcConfig::default())
    }

    pub fn open_with(config: SmcConfig) -> Result<Self> {
        let channel = IoKitChannel::new(&config);
        Self::connect(channel, config)
    }
}

impl<C: SmcChannel> Smc<C> {
    /// Wraps a channel without opening it.
    pub fn new(channel: C, config: SmcConfig) -> Self {
        Self {
            session: Mutex::new(Session {
                channel,
                state: ConnectionState::Closed,
            }),
            config,
        }
    }

    /// Wraps a channel and opens it.
    pub fn connect(channel: C, config: SmcConfig) -> Result<Self> {
        let smc = Self::new(channel, config);
        smc.open()?;
        Ok(smc)
    }

    pub fn config(&self) -> &SmcConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Acquires the channel.
    ///
    /// Fails with [`SmcError::AlreadyOpen`] and leaves the session untouched
    /// if it is already open. If the channel refuses, the session stays closed.
    pub fn open(&self) -> Result<()> {
        let mut session = self.lock();
        if session.state == ConnectionState::Open {
            return Err(SmcError::AlreadyOpen);
        }
        session.channel.open()?;
        session.state = ConnectionState::Open;
        debug!(service = %self.config.service, "SMC connection opened");
        Ok(())
    }

    /// Releases the channel.
    ///
    /// Fails with [`SmcError::AlreadyClosed`] if nothing is open. The session
    /// counts as closed even when the release call itself reports an error,
    /// so the handle is never released twice.
    pub fn close(&self) -> Result<()> {
        let mut session = self.lock();
        if session.state == ConnectionState::Closed {
            return Err(SmcError::AlreadyClosed);
        }
        session.state = ConnectionState::Closed;
        session.channel.close()?;
        debug!(service = %self.config.service, "SMC connection closed");
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Session<C>> {
        // Session fields are only written after the channel call returns, so
        // a panic mid-transaction leaves them consistent.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the open channel while holding the session lock.
    pub(crate) fn transact<T>(&self, f: impl FnOnce(&mut C) -> Result<T>) -> Result<T> {
        let mut session = self.lock();
        if session.state != ConnectionState::Open {
            return Err(SmcError::NotOpen);
        }
        f(&mut session.channel)
    }
}

impl<C: SmcChannel> Drop for Smc<C> {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if session.state == ConnectionState::Open {
            session.state = ConnectionState::Closed;
            if let Err(status) = session.channel.close() {
                warn!(%status, "failed to release SMC connection");
            }
        }
    }
}
