// ── Local selection ──

use serde::Serialize;

/// Something the user can select, rename, delete or inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Device(u64),
    Interface { device_id: u64, id: u64 },
    Link(u64),
    Group(u64),
}

/// Ordered set of locally selected items, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<Item>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn contains(&self, item: Item) -> bool {
        self.items.contains(&item)
    }

    /// Add `item` unless already selected.
    pub fn push(&mut self, item: Item) {
        if !self.contains(item) {
            self.items.push(item);
        }
    }

    pub fn remove(&mut self, item: Item) {
        self.items.retain(|i| *i != item);
    }

    pub fn take(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    /// The only selected item, if exactly one is selected.
    pub fn single(&self) -> Option<Item> {
        match self.items.as_slice() {
            [one] => Some(*one),
            _ => None,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().filter_map(|i| match i {
            Item::Device(id) => Some(*id),
            _ => None,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().filter_map(|i| match i {
            Item::Link(id) => Some(*id),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().filter_map(|i| match i {
            Item::Group(id) => Some(*id),
            _ => None,
        })
    }

    /// Drop every reference to a device, including its interfaces.
    pub fn forget_device(&mut self, device: u64) {
        self.items.retain(|i| match i {
            Item::Device(id) => *id != device,
            Item::Interface { device_id, .. } => *device_id != device,
            _ => true,
        });
    }
}
