//! End-to-end loss / recovery scenarios through the public API.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use revive_core::{
    BindError, ContextDiagnostics, ContextState, DisposeError, GpuResource, LossEvent,
    ProbeError, ProbeRequest, RecoveryPolicy, ResourceHandle, ResourceKind, SignalSink,
    SurfaceAdapter, SurfaceBinding, Timestamp,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(v: u64) -> Timestamp {
    Timestamp::from_millis(v)
}

struct CanvasEvent {
    prevented: bool,
}

impl LossEvent for CanvasEvent {
    fn is_cancelable(&self) -> bool {
        true
    }

    fn prevent_default(&mut self) {
        self.prevented = true;
    }
}

/// Records every call the core makes into the surface.
#[derive(Default)]
struct FakeCanvas {
    sink: Option<SignalSink>,
    lost: bool,
    probe_results: VecDeque<Result<(), ProbeError>>,
    probe_times: Vec<u32>,
    frame_requested: bool,
    frame_requests: u32,
    resumes: u32,
    detached: bool,
}

impl FakeCanvas {
    fn with_failures(n: usize) -> Self {
        let mut c = FakeCanvas { frame_requested: true, ..Self::default() };
        for _ in 0..n {
            c.probe_results.push_back(Err(ProbeError::new("gpu still resetting")));
        }
        c
    }

    /// What the render loop does at the end of each frame.
    fn request_frame_if(&mut self, allowed: bool) {
        if allowed {
            self.frame_requests += 1;
            self.frame_requested = true;
        }
    }

    fn fire_lost(&mut self) {
        self.lost = true;
        let mut ev = CanvasEvent { prevented: false };
        if let Some(sink) = &self.sink {
            sink.context_lost(&mut ev);
        }
        assert!(ev.prevented, "loss must be prevented to stay restorable");
    }

    fn fire_creation_error(&mut self) {
        if let Some(sink) = &self.sink {
            sink.creation_error(ContextDiagnostics {
                vendor: Some("Example Vendor".into()),
                renderer: None,
                ..ContextDiagnostics::default()
            });
        }
    }
}

impl SurfaceAdapter for FakeCanvas {
    fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
        self.sink = Some(sink);
        Ok(())
    }

    fn detach(&mut self) {
        self.detached = true;
        self.sink = None;
    }

    fn is_context_lost(&self) -> Option<bool> {
        Some(self.lost)
    }

    fn probe(&mut self, request: ProbeRequest) -> Result<(), ProbeError> {
        self.probe_times.push(request.attempt);
        let r = self.probe_results.pop_front().unwrap_or(Ok(()));
        if r.is_ok() {
            self.lost = false;
        }
        r
    }

    fn cancel_frame(&mut self) {
        self.frame_requested = false;
    }

    fn resume_frames(&mut self) {
        self.resumes += 1;
        self.frame_requested = true;
    }
}

struct FakeResource {
    handle: ResourceHandle,
    kind: ResourceKind,
    disposed: Cell<u32>,
}

impl FakeResource {
    fn new(kind: ResourceKind) -> Rc<Self> {
        Rc::new(Self {
            handle: ResourceHandle::next(),
            kind,
            disposed: Cell::new(0),
        })
    }
}

impl GpuResource for FakeResource {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposed.set(self.disposed.get() + 1);
        Ok(())
    }
}

fn record_transitions(binding: &mut SurfaceBinding<FakeCanvas>) -> Rc<RefCell<Vec<ContextState>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    binding.on_state_change(move |_, next| sink.borrow_mut().push(next.clone()));
    log
}

#[test]
fn normal_recovery() {
    init_logs();
    let policy = RecoveryPolicy::new().base_delay(Duration::from_millis(1500));
    let mut b = SurfaceBinding::mount(FakeCanvas::with_failures(0), policy).unwrap();
    let seen = record_transitions(&mut b);

    b.surface_mut().fire_lost();
    b.pump(ms(0));
    assert!(matches!(b.state(), ContextState::Recovering { attempt: 1, .. }));
    assert!(!b.surface().frame_requested);

    b.pump(ms(1499));
    assert!(b.surface().probe_times.is_empty());

    b.pump(ms(1500));
    assert_eq!(b.state(), &ContextState::Restored);
    assert_eq!(b.surface().resumes, 1);
    assert_eq!(
        *seen.borrow(),
        vec![
            ContextState::Lost,
            ContextState::Recovering { attempt: 1, next_retry_at: ms(1500) },
            ContextState::Restored,
        ]
    );
}

#[test]
fn exhaustion() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::with_failures(99), RecoveryPolicy::default()).unwrap();

    b.surface_mut().fire_lost();
    b.pump(ms(0));

    let mut deadlines = Vec::new();
    while let Some(at) = b.next_deadline() {
        deadlines.push(at);
        b.pump(at);
    }

    assert_eq!(deadlines, vec![ms(1000), ms(3000), ms(6000)]);
    assert_eq!(b.state(), &ContextState::Failed { attempts_exhausted: 3 });
    assert_eq!(b.surface().probe_times, vec![1, 2, 3]);

    b.pump(ms(60_000));
    assert_eq!(b.surface().probe_times.len(), 3);
    assert_eq!(b.next_deadline(), None);
}

#[test]
fn attempt_counter_restarts_after_restore() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::with_failures(2), RecoveryPolicy::default()).unwrap();

    b.surface_mut().fire_lost();
    b.pump(ms(0));
    b.pump(ms(1000));
    b.pump(ms(3000));
    b.pump(ms(6000));
    assert_eq!(b.state(), &ContextState::Restored);
    assert_eq!(b.orchestrator().attempt(), 0);

    b.surface_mut().fire_lost();
    b.pump(ms(10_000));
    assert_eq!(
        b.state(),
        &ContextState::Recovering { attempt: 1, next_retry_at: ms(11_000) }
    );
}

#[test]
fn no_frames_while_unhealthy() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::with_failures(1), RecoveryPolicy::default()).unwrap();

    b.surface_mut().fire_lost();
    let mut t = 0;
    while b.state() != &ContextState::Restored {
        b.pump(ms(t));
        let allowed = b.frames_allowed();
        if b.state().is_unhealthy() {
            assert!(!allowed);
        }
        if b.state() != &ContextState::Restored {
            b.surface_mut().request_frame_if(allowed);
            assert_eq!(b.surface().frame_requests, 0);
            assert!(!b.surface().frame_requested);
        }
        t += 250;
    }

    assert_eq!(b.surface().resumes, 1);
    assert!(b.surface().frame_requested);
}

#[test]
fn resource_accounting() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::default(), RecoveryPolicy::default()).unwrap();
    let mut all = Vec::new();
    for (kind, n) in [
        (ResourceKind::Geometry, 3),
        (ResourceKind::Material, 7),
        (ResourceKind::Texture, 2),
    ] {
        for _ in 0..n {
            let r = FakeResource::new(kind);
            b.ledger_mut().register(&r);
            all.push(r);
        }
    }

    let stats = b.ledger_mut().dispose_all();
    assert_eq!((stats.geometries, stats.materials, stats.textures), (3, 7, 2));
    assert!(all.iter().all(|r| r.disposed.get() == 1));
    assert_eq!(b.ledger_mut().dispose_all().total(), 0);
}

#[test]
fn teardown_during_recovery() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::with_failures(5), RecoveryPolicy::default()).unwrap();
    let seen = record_transitions(&mut b);

    b.surface_mut().fire_lost();
    b.pump(ms(0));
    b.pump(ms(1000));
    assert!(matches!(b.state(), ContextState::Recovering { attempt: 2, .. }));

    // Resources recreated mid-episode by scene code still get released.
    let tex = FakeResource::new(ResourceKind::Texture);
    b.ledger_mut().register(&tex);
    let seen_before = seen.borrow().len();

    let stats = b.unmount();
    assert_eq!(stats.textures, 1);
    assert_eq!(tex.disposed.get(), 1);
    assert_eq!(b.next_deadline(), None);
    assert!(b.surface().detached);

    b.pump(ms(3000));
    assert_eq!(b.surface().probe_times, vec![1]);
    assert_eq!(seen.borrow().len(), seen_before);
}

#[test]
fn creation_error_is_unsupported() {
    init_logs();
    let mut b = SurfaceBinding::mount(FakeCanvas::default(), RecoveryPolicy::default()).unwrap();
    let seen = record_transitions(&mut b);

    b.surface_mut().fire_creation_error();
    b.pump(ms(0));

    assert_eq!(b.state(), &ContextState::Unsupported);
    assert_eq!(*seen.borrow(), vec![ContextState::Unsupported]);
    assert_eq!(
        b.creation_diagnostics().and_then(|d| d.vendor.as_deref()),
        Some("Example Vendor")
    );
    assert_eq!(b.next_deadline(), None);

    b.surface_mut().fire_lost();
    b.pump(ms(100));
    assert_eq!(b.state(), &ContextState::Unsupported);
    assert!(b.surface().probe_times.is_empty());
}

#[test]
fn independent_bindings() {
    init_logs();
    let mut a = SurfaceBinding::mount(FakeCanvas::default(), RecoveryPolicy::default()).unwrap();
    let mut b = SurfaceBinding::mount(FakeCanvas::default(), RecoveryPolicy::default()).unwrap();

    a.surface_mut().fire_lost();
    a.pump(ms(0));
    b.pump(ms(0));

    assert!(a.state().is_unhealthy());
    assert_eq!(b.state(), &ContextState::Healthy);
    assert!(b.frames_allowed());
}
