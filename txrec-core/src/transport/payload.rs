//! Generic payload and its typed extension slots

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Command, ResponseStatus, TransactionPayload};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

struct Slot {
    value: Box<dyn Any>,
    /// Freed together with the payload instead of by whoever set it
    auto: bool,
}

/// Typed annotations carried alongside a transaction
///
/// At most one value per type. Values set with [`ExtensionSet::set_auto`] are
/// dropped when a pooled payload is released for the last time.
#[derive(Default)]
pub struct ExtensionSet {
    slots: HashMap<TypeId, Slot>,
}

impl fmt::Debug for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionSet")
            .field("len", &self.slots.len())
            .field("auto", &self.slots.values().filter(|s| s.auto).count())
            .finish()
    }
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_mut::<T>())
    }

    /// Attach a manually managed value, returning the one it replaces
    pub fn set<T: Any>(&mut self, value: T) -> Option<T> {
        self.insert(value, false)
    }

    /// Attach a value whose lifetime follows the pooled payload
    pub fn set_auto<T: Any>(&mut self, value: T) -> Option<T> {
        self.insert(value, true)
    }

    fn insert<T: Any>(&mut self, value: T, auto: bool) -> Option<T> {
        let previous = self.slots.insert(
            TypeId::of::<T>(),
            Slot {
                value: Box::new(value),
                auto,
            },
        );
        previous
            .and_then(|slot| slot.value.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn is_auto<T: Any>(&self) -> bool {
        self.slots
            .get(&TypeId::of::<T>())
            .map(|slot| slot.auto)
            .unwrap_or(false)
    }

    /// Drop every auto-managed value; returns how many were dropped
    pub fn clear_auto(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.auto);
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The base-protocol transaction payload
///
/// Every payload gets a process-unique `uid` at construction. Payloads
/// created with [`GenericPayload::with_memory_manager`] are reference counted
/// through [`acquire`](GenericPayload::acquire) and
/// [`release`](GenericPayload::release).
#[derive(Debug)]
pub struct GenericPayload {
    command: Command,
    address: u64,
    data: Vec<u8>,
    byte_enable: Vec<u8>,
    streaming_width: usize,
    response_status: ResponseStatus,
    dmi_allowed: bool,
    uid: u64,
    memory_manager: bool,
    ref_count: u32,
    extensions: ExtensionSet,
}

impl Default for GenericPayload {
    fn default() -> Self {
        Self::new(Command::Ignore, 0, Vec::new())
    }
}

impl GenericPayload {
    pub fn new(command: Command, address: u64, data: Vec<u8>) -> Self {
        let streaming_width = data.len();
        Self {
            command,
            address,
            data,
            byte_enable: Vec::new(),
            streaming_width,
            response_status: ResponseStatus::Incomplete,
            dmi_allowed: false,
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            memory_manager: false,
            ref_count: 0,
            extensions: ExtensionSet::new(),
        }
    }

    /// A read of `length` bytes into a zeroed buffer
    pub fn read(address: u64, length: usize) -> Self {
        Self::new(Command::Read, address, vec![0; length])
    }

    pub fn write(address: u64, data: &[u8]) -> Self {
        Self::new(Command::Write, address, data.to_vec())
    }

    pub fn with_byte_enable(mut self, byte_enable: Vec<u8>) -> Self {
        self.byte_enable = byte_enable;
        self
    }

    pub fn with_streaming_width(mut self, width: usize) -> Self {
        self.streaming_width = width;
        self
    }

    pub fn with_memory_manager(mut self) -> Self {
        self.memory_manager = true;
        self
    }

    pub fn set_command(&mut self, command: Command) {
        self.command = command;
    }

    pub fn set_address(&mut self, address: u64) {
        self.address = address;
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_enable(&self) -> &[u8] {
        &self.byte_enable
    }

    pub fn set_response_status(&mut self, status: ResponseStatus) {
        self.response_status = status;
    }

    pub fn dmi_allowed(&self) -> bool {
        self.dmi_allowed
    }

    pub fn set_dmi_allowed(&mut self, allowed: bool) {
        self.dmi_allowed = allowed;
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn acquire(&mut self) {
        self.ref_count += 1;
    }

    /// Drop one reference. Returns true when the last reference of a pooled
    /// payload was released; its auto extensions are freed at that point.
    pub fn release(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        if self.ref_count == 0 && self.memory_manager {
            self.extensions.clear_auto();
            self.response_status = ResponseStatus::Incomplete;
            return true;
        }
        false
    }
}

impl TransactionPayload for GenericPayload {
    fn command(&self) -> Command {
        self.command
    }

    fn address(&self) -> u64 {
        self.address
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn byte_enable_length(&self) -> usize {
        self.byte_enable.len()
    }

    fn streaming_width(&self) -> usize {
        self.streaming_width
    }

    fn response_status(&self) -> ResponseStatus {
        self.response_status
    }

    fn uid(&self) -> u64 {
        self.uid
    }

    fn has_memory_manager(&self) -> bool {
        self.memory_manager
    }

    fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut ExtensionSet {
        &mut self.extensions
    }
}
