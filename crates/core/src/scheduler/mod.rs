//! Frame-loop state machine.
//!
//! | state   | start             | stop    | not ready | ready             |
//! |---------|-------------------|---------|-----------|-------------------|
//! | Stopped | Active or Waiting | Stopped | Stopped   | Stopped           |
//! | Waiting | Waiting           | Stopped | Waiting   | Active (schedule) |
//! | Active  | Active            | Stopped | Waiting   | Active            |
//!
//! Leaving `Active` always cancels the pending frame request, so no tick can
//! run until the scheduler is active again.

use crate::resources::GateSignal;
use crate::surface::Surface;

/// Identifies one frame request made to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// The embedding environment: per-frame callbacks and the graphics context.
pub trait FrameHost {
    /// Asks for one callback on the next frame.
    fn request_frame(&mut self) -> FrameToken;

    fn cancel_frame(&mut self, token: FrameToken);

    fn context_available(&self) -> bool {
        true
    }

    /// Receives the finished canvas after every successful tick.
    fn present(&mut self, _frame: &Surface) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Stopped,
    /// Running, but paused until resources are ready.
    Waiting,
    Active,
}

#[derive(Debug, Default)]
pub struct RenderScheduler {
    state: SchedulerState,
    pending: Option<FrameToken>,
    ticks: u64,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != SchedulerState::Stopped
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn start<H: FrameHost + ?Sized>(&mut self, host: &mut H, ready: bool) {
        if self.is_running() {
            return;
        }
        if ready {
            self.activate(host);
        } else {
            self.set_state(SchedulerState::Waiting);
        }
    }

    pub fn stop<H: FrameHost + ?Sized>(&mut self, host: &mut H) {
        self.cancel(host);
        self.set_state(SchedulerState::Stopped);
    }

    /// Applies a readiness change from the resource gate.
    pub fn signal<H: FrameHost + ?Sized>(&mut self, host: &mut H, signal: GateSignal) {
        match (self.state, signal) {
            (SchedulerState::Active, GateSignal::NotReady) => {
                self.cancel(host);
                self.set_state(SchedulerState::Waiting);
            }
            (SchedulerState::Waiting, GateSignal::Ready) => self.activate(host),
            _ => {}
        }
    }

    /// Claims the frame callback for `token`. Returns false for stale or
    /// cancelled requests, which must not produce a tick.
    pub fn begin_tick(&mut self, token: FrameToken) -> bool {
        if self.state != SchedulerState::Active || self.pending != Some(token) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Records a finished tick and requests the next frame.
    pub fn end_tick<H: FrameHost + ?Sized>(&mut self, host: &mut H) {
        self.ticks += 1;
        if self.state == SchedulerState::Active && self.pending.is_none() {
            self.pending = Some(host.request_frame());
        }
    }

    fn activate<H: FrameHost + ?Sized>(&mut self, host: &mut H) {
        self.set_state(SchedulerState::Active);
        if self.pending.is_none() {
            self.pending = Some(host.request_frame());
        }
    }

    fn cancel<H: FrameHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(token) = self.pending.take() {
            host.cancel_frame(token);
        }
    }

    fn set_state(&mut self, state: SchedulerState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "scheduler transition");
            self.state = state;
        }
    }
}

/// Host that records frame requests so they can be fired by hand.
#[derive(Debug)]
pub struct ManualHost {
    next_token: u64,
    requested: Vec<FrameToken>,
    cancelled: Vec<FrameToken>,
    context: bool,
    presented: u64,
    last_frame: Option<Surface>,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self {
            next_token: 1,
            requested: Vec::new(),
            cancelled: Vec::new(),
            context: true,
            presented: 0,
            last_frame: None,
        }
    }
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest outstanding request.
    pub fn take_request(&mut self) -> Option<FrameToken> {
        if self.requested.is_empty() {
            None
        } else {
            Some(self.requested.remove(0))
        }
    }

    pub fn outstanding(&self) -> &[FrameToken] {
        &self.requested
    }

    pub fn cancelled(&self) -> &[FrameToken] {
        &self.cancelled
    }

    pub fn set_context_available(&mut self, available: bool) {
        self.context = available;
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&Surface> {
        self.last_frame.as_ref()
    }
}

impl FrameHost for ManualHost {
    fn request_frame(&mut self) -> FrameToken {
        let token = FrameToken(self.next_token);
        self.next_token += 1;
        self.requested.push(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.requested.retain(|&t| t != token);
        self.cancelled.push(token);
    }

    fn context_available(&self) -> bool {
        self.context
    }

    fn present(&mut self, frame: &Surface) {
        self.presented += 1;
        match &mut self.last_frame {
            Some(last) if last.dimensions() == frame.dimensions() => {
                last.pixels_mut().copy_from_slice(frame.pixels());
            }
            slot => *slot = Some(frame.clone()),
        }
    }
}
