use std::rc::Rc;

use super::GpuResource;

/// A material plus the textures bound to its map slots.
#[derive(Clone)]
pub struct MaterialRef {
    pub material: Rc<dyn GpuResource>,
    pub maps: Vec<Rc<dyn GpuResource>>,
}

impl MaterialRef {
    pub fn new(material: Rc<dyn GpuResource>) -> Self {
        Self { material, maps: Vec::new() }
    }

    pub fn with_map(mut self, texture: Rc<dyn GpuResource>) -> Self {
        self.maps.push(texture);
        self
    }
}

/// Material attachment of a scene node.
#[derive(Clone, Default)]
pub enum MaterialSlot {
    #[default]
    None,
    Single(MaterialRef),
    Multi(Vec<MaterialRef>),
}

impl MaterialSlot {
    pub fn iter(&self) -> impl Iterator<Item = &MaterialRef> {
        let slice: &[MaterialRef] = match self {
            MaterialSlot::None => &[],
            MaterialSlot::Single(m) => std::slice::from_ref(m),
            MaterialSlot::Multi(ms) => ms,
        };
        slice.iter()
    }
}

/// Minimal scene graph node for full-tree teardown.
#[derive(Clone, Default)]
pub struct SceneNode {
    pub name: String,
    pub geometry: Option<Rc<dyn GpuResource>>,
    pub material: MaterialSlot,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_geometry(mut self, geometry: Rc<dyn GpuResource>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_material(mut self, material: MaterialSlot) -> Self {
        self.material = material;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }
}
