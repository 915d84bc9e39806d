//! One-way link from the virtual clock to its secondary display.
//!
//! The clock only ever publishes. Whoever renders holds a
//! [`ClockSubscriber`]; dropping it is how a user "closes the window".

use std::sync::Mutex;

use chrono::NaiveDateTime;
use tokio::sync::watch;

use coursedrill_core::SimError;

/// Publishing half, owned by the clock while a run is active.
#[derive(Debug)]
pub struct ClockSurface {
    tx: watch::Sender<Option<NaiveDateTime>>,
}

/// Rendering half.
#[derive(Debug, Clone)]
pub struct ClockSubscriber {
    rx: watch::Receiver<Option<NaiveDateTime>>,
}

pub fn surface_pair() -> (ClockSurface, ClockSubscriber) {
    let (tx, rx) = watch::channel(None);
    (ClockSurface { tx }, ClockSubscriber { rx })
}

/// Returned when nobody is watching any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceClosed;

impl ClockSurface {
    pub fn publish(&self, virtual_now: NaiveDateTime) -> Result<(), SurfaceClosed> {
        self.tx.send(Some(virtual_now)).map_err(|_| SurfaceClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Close from the clock side. Subscribers see the channel end.
    pub fn close(self) {
        drop(self.tx);
    }
}

impl ClockSubscriber {
    pub fn latest(&self) -> Option<NaiveDateTime> {
        *self.rx.borrow()
    }

    /// Next published instant, or `None` once the clock closed the surface.
    pub async fn next(&mut self) -> Option<NaiveDateTime> {
        match self.rx.changed().await {
            Ok(()) => *self.rx.borrow_and_update(),
            Err(_) => None,
        }
    }
}

/// Opens the secondary display for a run.
pub trait SurfaceLauncher: Send + Sync + 'static {
    fn open(&self) -> Result<ClockSurface, SimError>;
}

/// Hands each opened surface's subscriber to whoever asks for it.
/// Used by front ends that render in-process, and by tests.
#[derive(Debug, Default)]
pub struct ChannelLauncher {
    pending: Mutex<Option<ClockSubscriber>>,
    blocked: bool,
}

impl ChannelLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose surface can never be created, like a blocked pop-up.
    pub fn blocked() -> Self {
        Self { pending: Mutex::new(None), blocked: true }
    }

    /// Subscriber of the most recently opened surface.
    pub fn take_subscriber(&self) -> Option<ClockSubscriber> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl SurfaceLauncher for ChannelLauncher {
    fn open(&self) -> Result<ClockSurface, SimError> {
        if self.blocked {
            return Err(SimError::SurfaceUnavailable("display surface blocked".into()));
        }
        let (surface, subscriber) = surface_pair();
        let mut slot = self
            .pending
            .lock()
            .map_err(|_| SimError::SurfaceUnavailable("launcher poisoned".into()))?;
        *slot = Some(subscriber);
        Ok(surface)
    }
}
