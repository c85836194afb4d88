use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use revive_core::SignalSink;

#[derive(Default)]
struct Inner {
    lost: AtomicBool,
    generation: AtomicU64,
    sink: Mutex<Option<SignalSink>>,
}

/// Device-loss flag shared with wgpu's device-lost callback.
///
/// wgpu may run the callback on any thread, so the flag is atomic and the
/// sink is behind a mutex. Each installed callback carries a generation
/// number; callbacks of replaced devices (which fire when the old device is
/// dropped) are ignored.
#[derive(Clone, Default)]
pub struct LossWatch {
    inner: Arc<Inner>,
}

impl LossWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the device-lost callback on a freshly created device and
    /// clears the loss flag.
    pub fn install(&self, device: &wgpu::Device) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.lost.store(false, Ordering::Release);

        let inner = self.inner.clone();
        device.set_device_lost_callback(move |reason, message| {
            if inner.generation.load(Ordering::Acquire) != generation {
                log::debug!("ignoring loss of replaced device ({reason:?})");
                return;
            }
            log::warn!("wgpu device lost ({reason:?}): {message}");
            inner.lost.store(true, Ordering::Release);
            let sink = inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(sink) = sink.as_ref() {
                sink.device_lost();
            }
        });
    }

    /// Marks the current device as lost without waiting for wgpu to report it.
    pub fn mark_lost(&self) {
        if !self.inner.lost.swap(true, Ordering::AcqRel) {
            let sink = self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(sink) = sink.as_ref() {
                sink.device_lost();
            }
        }
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.inner.lost.load(Ordering::Acquire)
    }

    pub fn set_sink(&self, sink: Option<SignalSink>) {
        *self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revive_core::{
        BindError, ContextMonitor, ContextSignal, ProbeError, ProbeRequest, SurfaceAdapter,
    };

    #[derive(Default)]
    struct Headless {
        sink: Option<SignalSink>,
    }

    impl SurfaceAdapter for Headless {
        fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
            self.sink = Some(sink);
            Ok(())
        }

        fn is_context_lost(&self) -> Option<bool> {
            None
        }

        fn probe(&mut self, _request: ProbeRequest) -> Result<(), ProbeError> {
            Ok(())
        }

        fn cancel_frame(&mut self) {}

        fn resume_frames(&mut self) {}
    }

    #[test]
    fn mark_lost_reports_once() {
        let monitor = ContextMonitor::new(None);
        let mut surface = Headless::default();
        let sub = monitor.bind(&mut surface).unwrap();

        let watch = LossWatch::new();
        watch.set_sink(surface.sink.clone());
        assert!(!watch.is_lost());

        watch.mark_lost();
        watch.mark_lost();

        assert!(watch.is_lost());
        assert_eq!(sub.drain(), vec![ContextSignal::Lost]);
    }

    #[test]
    fn mark_lost_without_sink_only_sets_flag() {
        let watch = LossWatch::new();
        let shared = watch.clone();
        watch.mark_lost();
        assert!(shared.is_lost());
    }
}
