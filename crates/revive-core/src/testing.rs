//! Test doubles shared by unit tests.

use std::cell::Cell;
use std::collections::VecDeque;

use crate::error::{BindError, DisposeError, ProbeError};
use crate::ledger::{GpuResource, ResourceHandle, ResourceKind};
use crate::monitor::{LossEvent, SignalSink};
use crate::surface::{ProbeRequest, SurfaceAdapter};

pub struct MockLossEvent {
    pub cancelable: bool,
    pub prevented: bool,
}

impl MockLossEvent {
    pub fn cancelable() -> Self {
        Self { cancelable: true, prevented: false }
    }
}

impl LossEvent for MockLossEvent {
    fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    fn prevent_default(&mut self) {
        self.prevented = true;
    }
}

/// Scripted surface. Probes succeed unless a result is queued in `probe_script`.
#[derive(Default)]
pub struct MockSurface {
    pub lost: Option<bool>,
    pub torn_down: bool,
    pub sink: Option<SignalSink>,
    pub attached: u32,
    pub detached: u32,
    pub probe_script: VecDeque<Result<(), ProbeError>>,
    pub probes: Vec<ProbeRequest>,
    pub frame_pending: bool,
    pub frames_cancelled: u32,
    pub resumes: u32,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            lost: Some(false),
            frame_pending: true,
            ..Self::default()
        }
    }

    pub fn failing_probes(n: usize) -> Self {
        let mut s = Self::new();
        for i in 0..n {
            s.probe_script.push_back(Err(ProbeError::new(format!("scripted failure {i}"))));
        }
        s
    }
}

impl SurfaceAdapter for MockSurface {
    fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
        self.attached += 1;
        self.sink = Some(sink);
        Ok(())
    }

    fn detach(&mut self) {
        self.detached += 1;
        self.sink = None;
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn is_context_lost(&self) -> Option<bool> {
        self.lost
    }

    fn probe(&mut self, request: ProbeRequest) -> Result<(), ProbeError> {
        self.probes.push(request);
        let result = self.probe_script.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.lost = Some(false);
        }
        result
    }

    fn cancel_frame(&mut self) {
        self.frames_cancelled += 1;
        self.frame_pending = false;
    }

    fn resume_frames(&mut self) {
        self.resumes += 1;
        self.frame_pending = true;
    }
}

pub struct MockResource {
    handle: ResourceHandle,
    kind: ResourceKind,
    fail: bool,
    pub disposals: Cell<u32>,
}

impl MockResource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            handle: ResourceHandle::next(),
            kind,
            fail: false,
            disposals: Cell::new(0),
        }
    }

    pub fn failing(kind: ResourceKind) -> Self {
        Self { fail: true, ..Self::new(kind) }
    }
}

impl GpuResource for MockResource {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposals.set(self.disposals.get() + 1);
        if self.fail {
            return Err(DisposeError::new("driver rejected dispose"));
        }
        Ok(())
    }
}
