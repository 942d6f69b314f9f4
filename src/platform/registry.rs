//! Window registry
//!
//! Maps the opaque identifiers a backend hands to native code back to
//! window instances. Keys carry a generation so a key that outlived its
//! window never resolves to the window that reused the slot.

use log::{debug, warn};

use crate::error::Error;

/// Generation-checked window key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    index: u32,
    generation: u32,
}

impl WindowKey {
    /// Pack into a single integer for native user-data slots
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

/// How many windows may be registered at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    /// One active window; a second registration is rejected until the
    /// first is removed (mobile and web embedding)
    #[default]
    Single,
    /// Any number of windows
    Multiple,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of windows
#[derive(Debug)]
pub struct WindowRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    policy: WindowPolicy,
    len: usize,
}

impl<T> WindowRegistry<T> {
    /// Create an empty registry
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            policy,
            len: 0,
        }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Whether the policy admits another window
    pub fn check_policy(&self) -> Result<(), Error> {
        if self.policy == WindowPolicy::Single && self.len > 0 {
            warn!("Rejecting second window registration");
            return Err(Error::MultipleWindows);
        }
        Ok(())
    }

    /// Register a window, subject to the policy
    pub fn insert(&mut self, value: T) -> Result<WindowKey, Error> {
        self.check_policy()?;

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                WindowKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                WindowKey {
                    index,
                    generation: 0,
                }
            }
        };
        self.len += 1;
        debug!("Registered window {:?}", key);
        Ok(key)
    }

    /// Get a window by key
    pub fn get(&self, key: WindowKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable window by key
    pub fn get_mut(&mut self, key: WindowKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Remove a window; its key and every copy of it become stale
    pub fn remove(&mut self, key: WindowKey) -> Option<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        debug!("Removed window {:?}", key);
        Some(value)
    }

    /// Iterate over live windows
    pub fn iter(&self) -> impl Iterator<Item = (WindowKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    WindowKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for WindowRegistry<T> {
    fn default() -> Self {
        Self::new(WindowPolicy::default())
    }
}
