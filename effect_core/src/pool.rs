//! Fixed-capacity slot pool addressed by generation-tagged handles
//!
//! Every free bumps the slot generation, so a handle kept across a free and a
//! reuse no longer resolves. Generations start at 1; a raw handle value of 0
//! is never produced and stands for "no handle".

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Index + generation reference into a [`SlotPool`]
pub struct Handle<T> {
    index: u16,
    generation: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The permanently invalid handle (raw value 0)
    pub const INVALID: Handle<T> = Handle {
        index: 0,
        generation: 0,
        _marker: PhantomData,
    };

    fn new(index: u16, generation: u16) -> Self {
        Handle {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn is_valid(&self) -> bool {
        self.generation != 0
    }

    /// Pack as `generation << 16 | index`
    pub fn to_raw(&self) -> u32 {
        (u32::from(self.generation) << 16) | u32::from(self.index)
    }

    pub fn from_raw(raw: u32) -> Self {
        Handle::new((raw & 0xffff) as u16, (raw >> 16) as u16)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_raw().hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: Option<T>,
    generation: u16,
    next_free: Option<u16>,
}

/// Pool of at most `capacity` live values with LIFO slot reuse
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u16>,
    live: usize,
}

impl<T> SlotPool<T> {
    /// Create a pool; capacity is clamped to what a 16-bit index can address
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize);
        let slots = (0..capacity)
            .map(|i| Slot {
                value: None,
                generation: 1,
                next_free: if i + 1 < capacity {
                    Some((i + 1) as u16)
                } else {
                    None
                },
            })
            .collect();
        SlotPool {
            slots,
            free_head: if capacity > 0 { Some(0) } else { None },
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_full(&self) -> bool {
        self.free_head.is_none()
    }

    /// Store a value, or hand it back when every slot is taken
    pub fn insert(&mut self, value: T) -> Result<Handle<T>, T> {
        let Some(index) = self.free_head else {
            return Err(value);
        };
        let slot = &mut self.slots[index as usize];
        self.free_head = slot.next_free.take();
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    fn slot_index(&self, handle: Handle<T>) -> Option<usize> {
        let slot = self.slots.get(handle.index as usize)?;
        (handle.is_valid() && slot.generation == handle.generation && slot.value.is_some())
            .then_some(handle.index as usize)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slot_index(handle).is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_mut()
    }

    /// Free the slot behind `handle`, invalidating every copy of it
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let index = self.slot_index(handle)?;
        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        slot.next_free = self.free_head;
        self.free_head = Some(index as u16);
        self.live -= 1;
        value
    }

    /// Live values in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u16, slot.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (Handle::new(i as u16, generation), v))
        })
    }

    /// Handles of every live value matching `pred`, in slot order
    pub fn handles_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<Handle<T>> {
        self.iter()
            .filter(|(_, v)| pred(v))
            .map(|(h, _)| h)
            .collect()
    }

    /// Free every slot, bumping generations so outstanding handles go stale
    pub fn clear(&mut self) {
        let live: Vec<Handle<T>> = self.iter().map(|(h, _)| h).collect();
        for handle in live {
            self.remove(handle);
        }
    }
}
