//! Reference-counted storage for backend objects.
//!
//! Compiled graph states never own backend objects directly. They hold
//! [`ResourceKey`]s into the runtime's [`ResourceArena`]; inheritance shares a
//! key between two states by bumping its reference count, and an object is
//! dropped when the last state referencing it lets go.

use slotmap::{SlotMap, new_key_type};

use crate::backend::NativeDevice;
use crate::shader::CompiledShader;
use crate::types::{BufferDescriptor, BufferKind, TextureDescriptor};

new_key_type! {
    /// Generation-checked key of an arena entry.
    pub struct ResourceKey;
}

/// A backend object with the descriptor it was created from.
pub(crate) enum ArenaObject<D: NativeDevice> {
    Buffer {
        buffer: D::Buffer,
        descriptor: BufferDescriptor,
    },
    Texture {
        texture: D::Texture,
        descriptor: TextureDescriptor,
    },
    Pipeline {
        pipeline: D::Pipeline,
        shader: CompiledShader,
        vertex_slots: usize,
    },
}

struct ArenaEntry<D: NativeDevice> {
    object: ArenaObject<D>,
    refs: u32,
}

/// Slot map of backend objects with explicit reference counts.
pub(crate) struct ResourceArena<D: NativeDevice> {
    entries: SlotMap<ResourceKey, ArenaEntry<D>>,
}

impl<D: NativeDevice> Default for ResourceArena<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: NativeDevice> ResourceArena<D> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
        }
    }

    /// Store an object with a reference count of one.
    pub(crate) fn insert(&mut self, object: ArenaObject<D>) -> ResourceKey {
        self.entries.insert(ArenaEntry { object, refs: 1 })
    }

    pub(crate) fn get(&self, key: ResourceKey) -> Option<&ArenaObject<D>> {
        self.entries.get(key).map(|entry| &entry.object)
    }

    /// Add a reference. Returns false if the key is stale.
    pub(crate) fn retain(&mut self, key: ResourceKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a reference, destroying the object when none remain.
    ///
    /// Returns true if the object was destroyed.
    pub(crate) fn release(&mut self, key: ResourceKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn ref_count(&self, key: ResourceKey) -> u32 {
        self.entries.get(key).map_or(0, |entry| entry.refs)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Bytes of the object behind `key`, split by category.
    pub(crate) fn footprint(&self, key: ResourceKey) -> Option<(Footprint, u64)> {
        match self.get(key)? {
            ArenaObject::Buffer { descriptor, .. } => {
                let category = match descriptor.kind {
                    BufferKind::Vertex => Footprint::VertexBuffer,
                    BufferKind::Index => Footprint::IndexBuffer,
                    BufferKind::Shader => Footprint::ShaderBuffer,
                };
                Some((category, descriptor.size))
            }
            ArenaObject::Texture { descriptor, .. } => {
                Some((Footprint::Texture, descriptor.byte_size()))
            }
            ArenaObject::Pipeline { .. } => None,
        }
    }
}

/// Memory category of an arena object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Footprint {
    VertexBuffer,
    IndexBuffer,
    ShaderBuffer,
    Texture,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyDevice, NativeDevice};

    fn buffer(device: &mut DummyDevice, size: u64) -> ArenaObject<DummyDevice> {
        let descriptor = BufferDescriptor::new(size, BufferKind::Vertex);
        ArenaObject::Buffer {
            buffer: device.create_buffer(&descriptor).unwrap(),
            descriptor,
        }
    }

    #[test]
    fn test_release_destroys_at_zero() {
        let mut device = DummyDevice::new();
        let mut arena = ResourceArena::new();
        let key = arena.insert(buffer(&mut device, 16));

        assert!(arena.retain(key));
        assert_eq!(arena.ref_count(key), 2);
        assert!(!arena.release(key));
        assert!(arena.get(key).is_some());
        assert!(arena.release(key));
        assert!(arena.get(key).is_none());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_stale_key_is_rejected() {
        let mut device = DummyDevice::new();
        let mut arena = ResourceArena::new();
        let key = arena.insert(buffer(&mut device, 16));
        arena.release(key);

        // The slot is reused with a new generation.
        let fresh = arena.insert(buffer(&mut device, 32));
        assert_ne!(key, fresh);
        assert!(!arena.retain(key));
        assert!(!arena.release(key));
        assert_eq!(arena.ref_count(fresh), 1);
    }

    #[test]
    fn test_footprint() {
        let mut device = DummyDevice::new();
        let mut arena = ResourceArena::new();
        let key = arena.insert(buffer(&mut device, 64));
        assert_eq!(arena.footprint(key), Some((Footprint::VertexBuffer, 64)));
    }
}
