//! Resource ledger.
//!
//! Tracks the GPU resources created under one surface so they can be disposed
//! deterministically on context loss, teardown or scene replacement.
//!
//! Two disposal paths exist:
//! - flat: [`ResourceLedger::register`] at creation time, [`ResourceLedger::dispose_all`] later
//! - tree: [`ResourceLedger::dispose_tree`] walks a [`SceneNode`] hierarchy
//!
//! Both paths share one "already disposed" set, so a resource reachable from
//! both is disposed once. The set only remembers resources that are still
//! alive somewhere; handles are never reused, so a dropped resource cannot
//! come back.

mod resource;
mod tree;

use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

pub use resource::{DisposeStats, GpuResource, ResourceHandle, ResourceKind};
pub use tree::{MaterialRef, MaterialSlot, SceneNode};

struct Entry {
    handle: ResourceHandle,
    kind: ResourceKind,
    resource: Weak<dyn GpuResource>,
}

/// Non-owning registry of GPU resources for one surface.
///
/// Performance characteristics:
/// - `register()` is O(1)
/// - `dispose_all()` is O(n) in registered entries
#[derive(Default)]
pub struct ResourceLedger {
    entries: Vec<Entry>,
    disposed: HashMap<ResourceHandle, Weak<dyn GpuResource>>,
    totals: DisposeStats,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource. Duplicate registration is tolerated.
    pub fn register<R>(&mut self, resource: &Rc<R>)
    where
        R: GpuResource + 'static,
    {
        let weak: Weak<R> = Rc::downgrade(resource);
        let weak: Weak<dyn GpuResource> = weak;
        self.push(resource.handle(), resource.kind(), weak);
    }

    /// Registers an already type-erased resource.
    pub fn register_dyn(&mut self, resource: &Rc<dyn GpuResource>) {
        self.push(resource.handle(), resource.kind(), Rc::downgrade(resource));
    }

    fn push(&mut self, handle: ResourceHandle, kind: ResourceKind, resource: Weak<dyn GpuResource>) {
        if self.disposed.contains_key(&handle) {
            log::warn!("registering {kind:?} {handle} which was already disposed");
        }
        self.entries.push(Entry { handle, kind, resource });
    }

    /// Number of registry entries (including duplicates and dead references).
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `handle` has been disposed through this ledger and the
    /// resource is still held somewhere.
    #[inline]
    pub fn is_disposed(&self, handle: ResourceHandle) -> bool {
        self.disposed.contains_key(&handle)
    }

    /// Disposes every registered resource once and clears the registry.
    ///
    /// Failing disposal routines are logged and counted; the pass continues.
    /// Entries whose owner already dropped the resource are skipped.
    pub fn dispose_all(&mut self) -> DisposeStats {
        let entries = std::mem::take(&mut self.entries);
        let mut pass = DisposeStats::default();
        let mut seen = HashSet::with_capacity(entries.len());

        for entry in entries {
            if !seen.insert(entry.handle) {
                continue;
            }
            match entry.resource.upgrade() {
                Some(resource) => self.dispose_one(&resource, &mut pass),
                None => log::trace!("{:?} {} dropped by owner before disposal", entry.kind, entry.handle),
            }
        }

        self.forget_dropped();
        self.totals += pass;
        if pass.total() > 0 || pass.failures > 0 {
            log::debug!("ledger disposed {pass}");
        }
        pass
    }

    /// Disposes geometry, materials and material maps of `root` and every
    /// descendant, depth-first. Children are detached from each node before
    /// descending and left empty.
    pub fn dispose_tree(&mut self, root: &mut SceneNode) -> DisposeStats {
        let mut pass = DisposeStats::default();
        self.walk(root, &mut pass);

        let disposed = &self.disposed;
        self.entries.retain(|e| !disposed.contains_key(&e.handle));
        self.forget_dropped();

        self.totals += pass;
        log::debug!("scene tree {:?} disposed {pass}", root.name);
        pass
    }

    fn walk(&mut self, node: &mut SceneNode, pass: &mut DisposeStats) {
        let children = std::mem::take(&mut node.children);
        for mut child in children {
            self.walk(&mut child, pass);
        }

        if let Some(geometry) = node.geometry.take() {
            self.dispose_one(&geometry, pass);
        }

        for m in std::mem::take(&mut node.material).iter() {
            for map in &m.maps {
                self.dispose_one(map, pass);
            }
            self.dispose_one(&m.material, pass);
        }
    }

    fn dispose_one(&mut self, resource: &Rc<dyn GpuResource>, pass: &mut DisposeStats) {
        let handle = resource.handle();
        let kind = resource.kind();

        if self
            .disposed
            .insert(handle, Rc::downgrade(resource))
            .is_some()
        {
            log::warn!(
                "{kind:?} {handle} {} already disposed; skipping",
                resource.label().unwrap_or("")
            );
            return;
        }

        match resource.dispose() {
            Ok(()) => pass.record(kind),
            Err(e) => {
                log::warn!("{kind:?} {handle} {}: {e}", resource.label().unwrap_or(""));
                pass.failures += 1;
            }
        }
    }

    /// Drops bookkeeping for disposed resources nobody holds anymore.
    fn forget_dropped(&mut self) {
        self.disposed.retain(|_, r| r.strong_count() > 0);
    }

    /// Cumulative disposal counts since creation or the last [`reset_stats`](Self::reset_stats).
    ///
    /// Reading does not reset.
    #[inline]
    pub fn stats(&self) -> DisposeStats {
        self.totals
    }

    pub fn reset_stats(&mut self) {
        self.totals = DisposeStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockResource;

    fn res(kind: ResourceKind) -> Rc<MockResource> {
        Rc::new(MockResource::new(kind))
    }

    // ── dispose_all ───────────────────────────────────────────────────────

    #[test]
    fn counts_by_kind() {
        let mut ledger = ResourceLedger::new();
        let mut keep = Vec::new();
        for (kind, n) in [
            (ResourceKind::Geometry, 4),
            (ResourceKind::Material, 2),
            (ResourceKind::Texture, 5),
        ] {
            for _ in 0..n {
                let r = res(kind);
                ledger.register(&r);
                keep.push(r);
            }
        }

        let stats = ledger.dispose_all();
        assert_eq!((stats.geometries, stats.materials, stats.textures), (4, 2, 5));
        assert!(keep.iter().all(|r| r.disposals.get() == 1));
        assert!(ledger.is_empty());
    }

    #[test]
    fn second_pass_is_empty() {
        let mut ledger = ResourceLedger::new();
        let r = res(ResourceKind::Texture);
        ledger.register(&r);

        assert_eq!(ledger.dispose_all().total(), 1);
        assert_eq!(ledger.dispose_all(), DisposeStats::default());
        assert_eq!(r.disposals.get(), 1);
    }

    #[test]
    fn duplicate_registration_disposes_once() {
        let mut ledger = ResourceLedger::new();
        let r = res(ResourceKind::Geometry);
        ledger.register(&r);
        ledger.register(&r);

        let stats = ledger.dispose_all();
        assert_eq!(stats.geometries, 1);
        assert_eq!(r.disposals.get(), 1);
    }

    #[test]
    fn reregistering_disposed_resource_is_not_disposed_again() {
        let mut ledger = ResourceLedger::new();
        let r = res(ResourceKind::Material);
        ledger.register(&r);
        ledger.dispose_all();

        ledger.register(&r);
        assert_eq!(ledger.dispose_all().total(), 0);
        assert_eq!(r.disposals.get(), 1);
    }

    #[test]
    fn failure_does_not_stop_the_pass() {
        let mut ledger = ResourceLedger::new();
        let a = res(ResourceKind::Geometry);
        let bad = Rc::new(MockResource::failing(ResourceKind::Material));
        let b = res(ResourceKind::Texture);
        ledger.register(&a);
        ledger.register(&bad);
        ledger.register(&b);

        let stats = ledger.dispose_all();
        assert_eq!(stats.geometries, 1);
        assert_eq!(stats.materials, 0);
        assert_eq!(stats.textures, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(b.disposals.get(), 1);
    }

    #[test]
    fn dropped_resources_are_skipped() {
        let mut ledger = ResourceLedger::new();
        {
            let r = res(ResourceKind::Texture);
            ledger.register(&r);
        }
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.dispose_all().total(), 0);
    }

    #[test]
    fn register_accepts_concrete_rc() {
        let mut ledger = ResourceLedger::new();
        let r: Rc<MockResource> = res(ResourceKind::Texture);
        ledger.register(&r);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.dispose_all().textures, 1);
        assert!(ledger.is_disposed(r.handle()));
    }

    #[test]
    fn repeated_loss_cycles_keep_bookkeeping_bounded() {
        let mut ledger = ResourceLedger::new();
        for _ in 0..1000 {
            let scene = [
                res(ResourceKind::Geometry),
                res(ResourceKind::Material),
                res(ResourceKind::Texture),
            ];
            for r in &scene {
                ledger.register(r);
            }
            assert_eq!(ledger.dispose_all().total(), 3);
        }

        assert!(ledger.is_empty());
        assert!(ledger.disposed.len() <= 3, "disposed set holds {}", ledger.disposed.len());
        assert_eq!(ledger.stats().total(), 3000);
    }

    #[test]
    fn tree_bookkeeping_forgets_resources_it_released() {
        let mut root = SceneNode::new("root").with_geometry(res(ResourceKind::Geometry));
        let mut ledger = ResourceLedger::new();
        assert_eq!(ledger.dispose_tree(&mut root).geometries, 1);
        assert!(ledger.disposed.is_empty());
    }

    #[test]
    fn register_dyn() {
        let mut ledger = ResourceLedger::new();
        let r: Rc<dyn GpuResource> = res(ResourceKind::Geometry);
        ledger.register_dyn(&r);
        assert_eq!(ledger.dispose_all().geometries, 1);
    }

    // ── stats ─────────────────────────────────────────────────────────────

    #[test]
    fn stats_accumulate_and_do_not_reset_on_read() {
        let mut ledger = ResourceLedger::new();
        let a = res(ResourceKind::Geometry);
        let b = res(ResourceKind::Geometry);

        ledger.register(&a);
        ledger.dispose_all();
        ledger.register(&b);
        ledger.dispose_all();

        assert_eq!(ledger.stats().geometries, 2);
        assert_eq!(ledger.stats().geometries, 2);

        ledger.reset_stats();
        assert_eq!(ledger.stats(), DisposeStats::default());
    }

    // ── dispose_tree ──────────────────────────────────────────────────────

    #[test]
    fn tree_disposes_every_slot() {
        let geo_a = res(ResourceKind::Geometry);
        let geo_b = res(ResourceKind::Geometry);
        let mat_a = res(ResourceKind::Material);
        let mat_b = res(ResourceKind::Material);
        let mat_c = res(ResourceKind::Material);
        let map = res(ResourceKind::Texture);

        let mut root = SceneNode::new("root")
            .with_child(
                SceneNode::new("mesh")
                    .with_geometry(geo_a.clone())
                    .with_material(MaterialSlot::Single(
                        MaterialRef::new(mat_a.clone()).with_map(map.clone()),
                    )),
            )
            .with_child(
                SceneNode::new("group").with_child(
                    SceneNode::new("multi")
                        .with_geometry(geo_b.clone())
                        .with_material(MaterialSlot::Multi(vec![
                            MaterialRef::new(mat_b.clone()),
                            MaterialRef::new(mat_c.clone()),
                        ])),
                ),
            );

        let mut ledger = ResourceLedger::new();
        let stats = ledger.dispose_tree(&mut root);

        assert_eq!((stats.geometries, stats.materials, stats.textures), (2, 3, 1));
        assert!(root.children.is_empty());
        for r in [&geo_a, &geo_b, &mat_a, &mat_b, &mat_c, &map] {
            assert_eq!(r.disposals.get(), 1);
        }
    }

    #[test]
    fn shared_texture_in_tree_disposed_once() {
        let shared = res(ResourceKind::Texture);
        let m1 = res(ResourceKind::Material);
        let m2 = res(ResourceKind::Material);
        let mut root = SceneNode::new("root").with_material(MaterialSlot::Multi(vec![
            MaterialRef::new(m1.clone()).with_map(shared.clone()),
            MaterialRef::new(m2.clone()).with_map(shared.clone()),
        ]));

        let stats = ResourceLedger::new().dispose_tree(&mut root);
        assert_eq!(stats.textures, 1);
        assert_eq!(shared.disposals.get(), 1);
    }

    #[test]
    fn tree_and_flat_paths_share_bookkeeping() {
        let geo = res(ResourceKind::Geometry);
        let other = res(ResourceKind::Texture);
        let mut ledger = ResourceLedger::new();
        ledger.register(&geo);
        ledger.register(&other);

        let mut root = SceneNode::new("root").with_geometry(geo.clone());
        ledger.dispose_tree(&mut root);
        assert_eq!(ledger.len(), 1);

        let stats = ledger.dispose_all();
        assert_eq!(stats.geometries, 0);
        assert_eq!(stats.textures, 1);
        assert_eq!(geo.disposals.get(), 1);
        assert_eq!(ledger.stats().total(), 2);
    }

    #[test]
    fn node_without_material_is_fine() {
        let mut root = SceneNode::new("empty").with_child(SceneNode::new("leaf"));
        let stats = ResourceLedger::new().dispose_tree(&mut root);
        assert_eq!(stats, DisposeStats::default());
    }
}
