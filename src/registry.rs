//! Process-wide list of active handles.
//!
//! Modeled as a single owned container behind whatever initialization
//! barrier the embedding application chooses — this type itself has no
//! global state and no particular lifetime tied to process start, so tests
//! can construct, use and destroy a fresh registry per case.

use crate::descriptor::ProtocolDescriptor;
use crate::error::Error;
use crate::handle::{Handle, TransportKind};

/// A compact, insertion-order-preserving table of handles, up to a
/// compile-time (well, construction-time) maximum.
///
/// Back-pointers from a received package to its owning handle are
/// represented as a plain `usize` index into this table rather than a raw
/// pointer, per the protocol's design notes — lifetimes stay tractable and
/// the index is cheap to copy into diagnostics.
pub struct HandleRegistry {
    handles: Vec<Handle>,
    max_handles: usize,
    default_index: Option<usize>,
}

impl HandleRegistry {
    pub fn new(max_handles: usize) -> Self {
        HandleRegistry {
            handles: Vec::with_capacity(max_handles),
            max_handles,
            default_index: None,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn default_index(&self) -> Option<usize> {
        self.default_index
    }

    pub fn get(&self, index: usize) -> Option<&Handle> {
        self.handles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Handle> {
        self.handles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Handle)> {
        self.handles.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Handle)> {
        self.handles.iter_mut().enumerate()
    }

    /// Looks up a handle by its transport identity (e.g. the OS file
    /// descriptor or UART peripheral pointer a callback reports).
    pub fn find_by_transport_id(&self, transport_id: u64) -> Option<usize> {
        self.handles
            .iter()
            .position(|h| h.transport_id == transport_id)
    }

    /// Registers a new handle, arming it with `transport_id`/`kind`.
    /// Promotes it to the default handle if `make_default` is set or if
    /// this is the first handle in an otherwise-empty registry.
    pub fn init_handle(
        &mut self,
        descriptor: ProtocolDescriptor,
        scratch_capacity: usize,
        transport_id: u64,
        kind: TransportKind,
        make_default: bool,
    ) -> Result<usize, Error> {
        if self.handles.len() >= self.max_handles {
            return Err(Error::RegistryFull {
                max: self.max_handles,
            });
        }

        let mut handle = Handle::new(descriptor, scratch_capacity);
        handle.activate(transport_id, kind);
        let index = self.handles.len();
        self.handles.push(handle);

        if make_default || self.default_index.is_none() {
            self.set_default(index)?;
        }

        Ok(index)
    }

    /// Unregisters the handle at `index`, compacting the table so every
    /// later handle shifts down by one slot. Clears the default pointer if
    /// it pointed at the removed handle, and re-targets it at the new
    /// occupant of that pointer's index otherwise.
    ///
    /// The original firmware's equivalent shift loop guards each copy with
    /// a null check that can skip over a hole mid-list, leaving the
    /// invariant "all empty slots occur only after the active count"
    /// unenforced. This implementation removes the element unconditionally
    /// ([`Vec::remove`] always shifts every later element down by one), so
    /// the invariant holds by construction.
    pub fn deinit_handle(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.handles.len() {
            return Err(Error::HandleNotFound(index));
        }
        self.handles[index].deactivate();
        self.handles.remove(index);

        self.default_index = match self.default_index {
            Some(d) if d == index => None,
            Some(d) if d > index => Some(d - 1),
            other => other,
        };
        Ok(())
    }

    /// Clears the default bit on every handle, then sets it on `index`.
    /// Fails if `index` is out of range or the target handle is not
    /// enabled.
    pub fn set_default(&mut self, index: usize) -> Result<(), Error> {
        if self.handles.is_empty() {
            return Err(Error::RegistryEmpty);
        }
        let target = self
            .handles
            .get(index)
            .ok_or(Error::HandleNotFound(index))?;
        if !target.is_enabled() {
            return Err(Error::HandleNotEnabled(index));
        }

        for (i, h) in self.handles.iter_mut().enumerate() {
            h.set_default(i == index);
        }
        self.default_index = Some(index);
        Ok(())
    }

    pub fn clear_buffer(&mut self, index: usize) -> Result<(), Error> {
        self.handles
            .get_mut(index)
            .ok_or(Error::HandleNotFound(index))?
            .clear_buffer();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ProtocolDescriptor;

    fn desc() -> ProtocolDescriptor {
        ProtocolDescriptor::reference()
    }

    #[test]
    fn first_handle_becomes_default() {
        let mut reg = HandleRegistry::new(4);
        let idx = reg
            .init_handle(desc(), 256, 1, TransportKind::Serial, false)
            .unwrap();
        assert_eq!(reg.default_index(), Some(idx));
        assert!(reg.get(idx).unwrap().is_default());
    }

    #[test]
    fn registry_rejects_beyond_max() {
        let mut reg = HandleRegistry::new(1);
        reg.init_handle(desc(), 64, 1, TransportKind::Serial, false)
            .unwrap();
        let err = reg
            .init_handle(desc(), 64, 2, TransportKind::Serial, false)
            .unwrap_err();
        assert!(matches!(err, Error::RegistryFull { max: 1 }));
    }

    #[test]
    fn deinit_compacts_and_clears_default() {
        let mut reg = HandleRegistry::new(4);
        let a = reg
            .init_handle(desc(), 64, 1, TransportKind::Serial, false)
            .unwrap();
        let b = reg
            .init_handle(desc(), 64, 2, TransportKind::Serial, false)
            .unwrap();
        let c = reg
            .init_handle(desc(), 64, 3, TransportKind::Serial, false)
            .unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        // default is handle 0 (a). Remove the middle handle (b).
        reg.deinit_handle(b).unwrap();
        assert_eq!(reg.len(), 2);
        // c shifted down into slot 1; transport_id proves identity.
        assert_eq!(reg.get(1).unwrap().transport_id, 3);
        // default pointer (slot 0) is untouched since it was before the removed slot.
        assert_eq!(reg.default_index(), Some(0));

        reg.deinit_handle(0).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.default_index(), None);
    }

    #[test]
    fn set_default_rejects_disabled_handle() {
        let mut reg = HandleRegistry::new(4);
        reg.init_handle(desc(), 64, 1, TransportKind::Serial, false)
            .unwrap();
        let err = reg.set_default(5).unwrap_err();
        assert!(matches!(err, Error::HandleNotFound(5)));
    }
}
