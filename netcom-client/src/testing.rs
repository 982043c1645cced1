//! In-process fake COM objects for tests.
//!
//! Every fake is a heap block whose first field points at a hand-built
//! vtable, exactly like a real COM object. A shared [`Tracker`] records
//! every `AddRef`, `Release`, vtable call and destruction by object name, so
//! tests can assert reference-count discipline on any target.

#![allow(
    clippy::missing_panics_doc,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::significant_drop_tightening
)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::com::abi::{
    DispParams, E_FAIL, E_NOINTERFACE, E_NOTIMPL, E_POINTER, GUID, HRESULT, IID_IDISPATCH,
    IID_IENUMVARIANT, IID_IUNKNOWN, RawVariant, S_FALSE, S_OK, VARIANT_FALSE, VARIANT_TRUE,
    VT_DISPATCH, VT_UNKNOWN, VariantBool, guid_to_uuid, uuid_to_guid,
};
use crate::com::object::{ComInterface, ComObject};
use crate::com::sys;
use crate::com_worker::ComSource;
use crate::error::ComResult;
use crate::network::{
    IID_INETWORK, IID_INETWORK_CONNECTION, IID_INETWORK_LIST_MANAGER, NetworkListManager,
};
use crate::shell::{IID_IQUERY_ASSOCIATIONS, QueryAssociations};

/// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`.
pub const E_ELEMENT_NOT_FOUND: HRESULT = HRESULT(0x8007_0490_u32 as i32);
/// `HRESULT_FROM_WIN32(ERROR_NO_ASSOCIATION)`.
pub const E_NO_ASSOCIATION: HRESULT = HRESULT(0x8007_0483_u32 as i32);

// ── Tracker ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    created: usize,
    destroyed: usize,
    add_refs: usize,
    releases: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    counts: HashMap<String, Counts>,
    calls: HashMap<(String, usize), usize>,
    names: HashMap<usize, String>,
}

/// Shared record of what happened to every fake object.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut Counts)) {
        f(self.state().counts.entry(name.to_string()).or_default());
    }

    fn count(&self, name: &str) -> Counts {
        self.state().counts.get(name).copied().unwrap_or_default()
    }

    fn call(&self, name: &str, slot: usize) {
        *self.state().calls.entry((name.to_string(), slot)).or_default() += 1;
    }

    /// Fake objects created and not yet destroyed, across all names.
    pub fn live(&self) -> usize {
        self.state()
            .counts
            .values()
            .map(|c| c.created - c.destroyed)
            .sum()
    }

    pub fn created(&self, name: &str) -> usize {
        self.count(name).created
    }

    pub fn destroyed(&self, name: &str) -> usize {
        self.count(name).destroyed
    }

    pub fn releases(&self, name: &str) -> usize {
        self.count(name).releases
    }

    pub fn add_refs(&self, name: &str) -> usize {
        self.count(name).add_refs
    }

    /// Outstanding references over all live objects called `name`.
    pub fn refcount(&self, name: &str) -> usize {
        let c = self.count(name);
        (c.created + c.add_refs).saturating_sub(c.releases)
    }

    /// Times vtable slot `slot` was called on objects called `name`.
    pub fn calls(&self, name: &str, slot: usize) -> usize {
        self.state()
            .calls
            .get(&(name.to_string(), slot))
            .copied()
            .unwrap_or_default()
    }

    /// Times `IDispatch::Invoke` was called on objects called `name`.
    pub fn invokes(&self, name: &str) -> usize {
        self.calls(name, 6)
    }

    /// Name of the live fake at `ptr`.
    pub fn name_of(&self, ptr: *mut c_void) -> String {
        self.state()
            .names
            .get(&(ptr as usize))
            .cloned()
            .unwrap_or_default()
    }
}

// ── Fake object ─────────────────────────────────────────────────────

enum Behavior {
    Plain,
    Enumerator(Mutex<VecDeque<EnumStep>>),
    NewEnum(Mutex<Option<ComObject>>),
    Network(Mutex<NetworkSpec>),
    Connection(ConnectionSpec),
    Manager(ManagerSpec),
    Associations(Mutex<AssociationSpec>),
}

#[repr(C)]
struct FakeObject {
    vtable: *const *const c_void,
    slots: Vec<*const c_void>,
    refs: AtomicU32,
    name: String,
    tracker: Tracker,
    interfaces: Vec<GUID>,
    redirects: Vec<(GUID, ComObject)>,
    failures: Vec<(usize, HRESULT)>,
    behavior: Behavior,
}

impl FakeObject {
    unsafe fn from_this<'a>(this: *mut c_void) -> &'a Self {
        unsafe { &*this.cast::<Self>() }
    }

    /// Records the call and returns the injected failure for `slot`, if any.
    fn enter(&self, slot: usize) -> Option<HRESULT> {
        self.tracker.call(&self.name, slot);
        self.failures
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, hr)| *hr)
    }
}

/// Builds a fake object with counted lifecycle slots.
pub struct FakeBuilder {
    tracker: Tracker,
    name: String,
    interfaces: Vec<GUID>,
    redirects: Vec<(GUID, ComObject)>,
    failures: Vec<(usize, HRESULT)>,
    slots: BTreeMap<usize, *const c_void>,
    behavior: Behavior,
}

impl FakeBuilder {
    pub fn new(tracker: &Tracker, name: impl Into<String>) -> Self {
        Self {
            tracker: tracker.clone(),
            name: name.into(),
            interfaces: Vec::new(),
            redirects: Vec::new(),
            failures: Vec::new(),
            slots: BTreeMap::new(),
            behavior: Behavior::Plain,
        }
    }

    /// Answers `QueryInterface(iid)` with itself.
    pub fn interface(mut self, iid: GUID) -> Self {
        self.interfaces.push(iid);
        self
    }

    /// Answers `QueryInterface(iid)` with a new reference to `target`.
    pub fn redirect(mut self, iid: GUID, target: ComObject) -> Self {
        self.redirects.push((iid, target));
        self
    }

    /// Makes vtable slot `slot` fail with `status`.
    pub fn fail(mut self, slot: usize, status: HRESULT) -> Self {
        self.failures.push((slot, status));
        self
    }

    fn slot(mut self, index: usize, f: *const c_void) -> Self {
        self.slots.insert(index, f);
        self
    }

    fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn build(self) -> ComObject {
        let len = self.slots.keys().next_back().map_or(3, |max| (max + 1).max(3));
        let mut slots = vec![unexpected as UnexpectedFn as *const c_void; len];
        slots[0] = query_interface as QueryFn as *const c_void;
        slots[1] = add_ref as CountFn as *const c_void;
        slots[2] = release as CountFn as *const c_void;
        for (index, f) in self.slots {
            slots[index] = f;
        }

        let mut object = Box::new(FakeObject {
            vtable: std::ptr::null(),
            slots,
            refs: AtomicU32::new(1),
            name: self.name,
            tracker: self.tracker,
            interfaces: self.interfaces,
            redirects: self.redirects,
            failures: self.failures,
            behavior: self.behavior,
        });
        object.vtable = object.slots.as_ptr();
        object.tracker.update(&object.name, |c| c.created += 1);

        let name = object.name.clone();
        let tracker = object.tracker.clone();
        let raw = Box::into_raw(object).cast::<c_void>();
        tracker.state().names.insert(raw as usize, name);
        unsafe { ComObject::from_raw(raw) }.expect("Box::into_raw is never null")
    }
}

type QueryFn = unsafe extern "system" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT;
type CountFn = unsafe extern "system" fn(*mut c_void) -> u32;
type UnexpectedFn = unsafe extern "system" fn(*mut c_void) -> HRESULT;

unsafe extern "system" fn unexpected(_this: *mut c_void) -> HRESULT {
    E_NOTIMPL
}

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    iid: *const GUID,
    out: *mut *mut c_void,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    let iid = unsafe { &*iid };
    unsafe { *out = std::ptr::null_mut() };
    object.tracker.call(&object.name, 0);

    if let Some((_, target)) = object.redirects.iter().find(|(g, _)| g == iid) {
        let target = target.duplicate();
        unsafe { *out = target.into_raw() };
        return S_OK;
    }
    if *iid == IID_IUNKNOWN || object.interfaces.contains(iid) {
        unsafe { add_ref(this) };
        unsafe { *out = this };
        return S_OK;
    }
    E_NOINTERFACE
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    let object = unsafe { FakeObject::from_this(this) };
    object.tracker.update(&object.name, |c| c.add_refs += 1);
    object.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let object = unsafe { FakeObject::from_this(this) };
    object.tracker.update(&object.name, |c| c.releases += 1);
    let remaining = object.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        let tracker = object.tracker.clone();
        let name = object.name.clone();
        tracker.state().names.remove(&(this as usize));
        // Drops any references the fake itself holds (redirects, scripts).
        drop(unsafe { Box::from_raw(this.cast::<FakeObject>()) });
        tracker.update(&name, |c| c.destroyed += 1);
    }
    remaining
}

// ── IDispatch / IEnumVARIANT ────────────────────────────────────────

/// One scripted answer of a fake `IEnumVARIANT::Next`.
pub enum EnumStep {
    Item { vt: u16, object: ComObject },
    Inert { vt: u16, payload: usize },
    Fail { status: HRESULT, stray: Option<ComObject> },
}

impl EnumStep {
    /// A fresh fake called `name`, delivered with tag `vt`.
    pub fn object(tracker: &Tracker, name: &str, vt: u16) -> Self {
        Self::Item {
            vt,
            object: FakeBuilder::new(tracker, name).interface(IID_IDISPATCH).build(),
        }
    }

    /// An already-built object (e.g. a fake network) delivered as `VT_DISPATCH`.
    pub fn dispatch(object: ComObject) -> Self {
        Self::Item {
            vt: VT_DISPATCH,
            object,
        }
    }

    /// A record that must be skipped without being released.
    pub fn inert(vt: u16, payload: usize) -> Self {
        Self::Inert { vt, payload }
    }

    pub fn fail(status: HRESULT) -> Self {
        Self::Fail {
            status,
            stray: None,
        }
    }

    /// A failed fetch that still wrote an object reference into the record.
    pub fn fail_with_object(tracker: &Tracker, name: &str, status: HRESULT) -> Self {
        Self::Fail {
            status,
            stray: Some(FakeBuilder::new(tracker, name).build()),
        }
    }
}

type EnumNextFn = unsafe extern "system" fn(*mut c_void, u32, *mut RawVariant, *mut u32) -> HRESULT;
type InvokeFn = unsafe extern "system" fn(
    *mut c_void,
    i32,
    *const GUID,
    u32,
    u16,
    *mut DispParams,
    *mut RawVariant,
    *mut c_void,
    *mut u32,
) -> HRESULT;

unsafe extern "system" fn enum_next(
    this: *mut c_void,
    requested: u32,
    items: *mut RawVariant,
    fetched: *mut u32,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(3) {
        return hr;
    }
    let Behavior::Enumerator(script) = &object.behavior else {
        return E_FAIL;
    };
    if requested != 1 {
        return E_NOTIMPL;
    }

    let item = unsafe { &mut *items };
    unsafe { *fetched = 0 };
    let step = script.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front();
    match step {
        None => S_FALSE,
        Some(EnumStep::Item { vt, object }) => {
            item.vt = vt;
            item.payload[0] = object.into_raw() as usize;
            unsafe { *fetched = 1 };
            S_OK
        }
        Some(EnumStep::Inert { vt, payload }) => {
            item.vt = vt;
            item.payload[0] = payload;
            unsafe { *fetched = 1 };
            S_OK
        }
        Some(EnumStep::Fail { status, stray }) => {
            if let Some(stray) = stray {
                item.vt = VT_UNKNOWN;
                item.payload[0] = stray.into_raw() as usize;
            }
            status
        }
    }
}

unsafe extern "system" fn invoke(
    this: *mut c_void,
    member: i32,
    _iid: *const GUID,
    _locale: u32,
    flags: u16,
    params: *mut DispParams,
    result: *mut RawVariant,
    _exception: *mut c_void,
    _arg_error: *mut u32,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(6) {
        return hr;
    }
    let Behavior::NewEnum(target) = &object.behavior else {
        return crate::com::abi::DISP_E_MEMBERNOTFOUND;
    };
    let params = unsafe { &*params };
    if member != -4 || flags & 2 == 0 || params.arg_count != 0 || result.is_null() {
        return crate::com::abi::DISP_E_MEMBERNOTFOUND;
    }
    let guard = target.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let Some(target) = guard.as_ref() else {
        return crate::com::abi::DISP_E_MEMBERNOTFOUND;
    };
    let result = unsafe { &mut *result };
    result.vt = VT_UNKNOWN;
    result.payload[0] = target.duplicate().into_raw() as usize;
    S_OK
}

fn fake_enumerator(tracker: &Tracker, name: &str, steps: Vec<EnumStep>) -> ComObject {
    FakeBuilder::new(tracker, name)
        .interface(IID_IENUMVARIANT)
        .slot(3, enum_next as EnumNextFn as *const c_void)
        .behavior(Behavior::Enumerator(Mutex::new(steps.into())))
        .build()
}

/// A collection called `name` backed by an enumerator called `{name}.enum`.
///
/// With `direct`, the collection answers `QueryInterface(IID_IEnumVARIANT)`.
/// Otherwise it only implements `IDispatch`, and `Invoke(DISPID_NEWENUM)`
/// returns an intermediate `{name}.newenum` object that in turn answers the
/// enumerator query.
pub fn collection_of(
    tracker: &Tracker,
    name: &str,
    steps: Vec<EnumStep>,
    direct: bool,
) -> ComObject {
    let enumerator = fake_enumerator(tracker, &format!("{name}.enum"), steps);
    if direct {
        return FakeBuilder::new(tracker, name)
            .redirect(IID_IENUMVARIANT, enumerator)
            .build();
    }
    let new_enum = FakeBuilder::new(tracker, format!("{name}.newenum"))
        .redirect(IID_IENUMVARIANT, enumerator)
        .build();
    new_enum_member(tracker, name, Some(new_enum))
        .interface(IID_IDISPATCH)
        .build()
}

/// [`collection_of`] with the names `collection`, `collection.enum` and
/// `collection.newenum`.
pub fn fake_collection(tracker: &Tracker, steps: Vec<EnumStep>, direct: bool) -> ComObject {
    collection_of(tracker, "collection", steps, direct)
}

/// An object whose `Invoke(DISPID_NEWENUM)` hands out a new reference to
/// `member`, or fails with `DISP_E_MEMBERNOTFOUND` when there is none.
///
/// The builder does not advertise `IDispatch`; add it with
/// [`FakeBuilder::interface`].
pub fn new_enum_member(tracker: &Tracker, name: &str, member: Option<ComObject>) -> FakeBuilder {
    FakeBuilder::new(tracker, name)
        .slot(6, invoke as InvokeFn as *const c_void)
        .behavior(Behavior::NewEnum(Mutex::new(member)))
}

// ── Network List Manager ────────────────────────────────────────────

/// Scripted state of a fake `INetwork`.
#[derive(Debug, Clone, Default)]
pub struct NetworkSpec {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: i32,
    pub domain_type: i32,
    pub connectivity: i32,
    pub connected: bool,
    pub internet: bool,
    /// FILETIME ticks.
    pub created: u64,
    /// FILETIME ticks.
    pub connected_at: u64,
    pub connections: Vec<ConnectionSpec>,
    /// Slot failures injected into every fake built from this spec.
    pub failures: Vec<(usize, HRESULT)>,
}

impl NetworkSpec {
    pub fn new(id: u128, name: &str) -> Self {
        Self {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            description: format!("{name} description"),
            ..Self::default()
        }
    }

    pub fn connected(mut self, internet: bool) -> Self {
        self.connected = true;
        self.internet = internet;
        self.connectivity = if internet { 0x40 } else { 0x20 };
        self
    }

    pub fn with_connection(mut self, connection: ConnectionSpec) -> Self {
        self.connections.push(connection);
        self
    }
}

/// Scripted state of a fake `INetworkConnection`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSpec {
    pub label: String,
    pub id: Uuid,
    pub adapter_id: Uuid,
    pub connectivity: i32,
    pub domain_type: i32,
    pub connected: bool,
    pub internet: bool,
    /// The network `GetNetwork` hands out; built without its connections.
    pub network: Option<Box<NetworkSpec>>,
    pub failures: Vec<(usize, HRESULT)>,
}

impl ConnectionSpec {
    pub fn new(label: &str, id: u128, adapter_id: u128) -> Self {
        Self {
            label: label.to_string(),
            id: Uuid::from_u128(id),
            adapter_id: Uuid::from_u128(adapter_id),
            connected: true,
            connectivity: 0x40,
            internet: true,
            ..Self::default()
        }
    }
}

/// Scripted state of a fake `INetworkListManager`.
#[derive(Debug, Clone, Default)]
pub struct ManagerSpec {
    pub networks: Vec<NetworkSpec>,
    pub connected: bool,
    pub internet: bool,
    pub connectivity: i32,
    /// Whether collections answer `QueryInterface(IID_IEnumVARIANT)` directly.
    pub direct_collections: bool,
}

fn bool_out(out: *mut VariantBool, value: bool) {
    unsafe { *out = if value { VARIANT_TRUE } else { VARIANT_FALSE } };
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn with_network(
    this: *mut c_void,
    slot: usize,
    f: impl FnOnce(&FakeObject, &mut NetworkSpec) -> HRESULT,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(slot) {
        return hr;
    }
    match &object.behavior {
        Behavior::Network(spec) => f(object, &mut lock(spec)),
        _ => E_FAIL,
    }
}

fn with_connection(
    this: *mut c_void,
    slot: usize,
    f: impl FnOnce(&FakeObject, &ConnectionSpec) -> HRESULT,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(slot) {
        return hr;
    }
    match &object.behavior {
        Behavior::Connection(spec) => f(object, spec),
        _ => E_FAIL,
    }
}

fn with_manager(
    this: *mut c_void,
    slot: usize,
    f: impl FnOnce(&FakeObject, &ManagerSpec) -> HRESULT,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(slot) {
        return hr;
    }
    match &object.behavior {
        Behavior::Manager(spec) => f(object, spec),
        _ => E_FAIL,
    }
}

type StringOutFn = unsafe extern "system" fn(*mut c_void, *mut *mut u16) -> HRESULT;
type StringInFn = unsafe extern "system" fn(*mut c_void, *mut u16) -> HRESULT;
type GuidOutFn = unsafe extern "system" fn(*mut c_void, *mut GUID) -> HRESULT;
type I32OutFn = unsafe extern "system" fn(*mut c_void, *mut i32) -> HRESULT;
type I32InFn = unsafe extern "system" fn(*mut c_void, i32) -> HRESULT;
type BoolOutFn = unsafe extern "system" fn(*mut c_void, *mut VariantBool) -> HRESULT;
type ObjectOutFn = unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT;
type TimesFn =
    unsafe extern "system" fn(*mut c_void, *mut u32, *mut u32, *mut u32, *mut u32) -> HRESULT;

unsafe fn read_bstr(value: *mut u16) -> String {
    let len = unsafe { sys::bstr_len(value) };
    if len == 0 {
        return String::new();
    }
    String::from_utf16_lossy(unsafe { std::slice::from_raw_parts(value, len) })
}

unsafe extern "system" fn network_get_name(this: *mut c_void, out: *mut *mut u16) -> HRESULT {
    with_network(this, 7, |_, spec| {
        unsafe { *out = sys::bstr_alloc(&spec.name) };
        S_OK
    })
}

unsafe extern "system" fn network_set_name(this: *mut c_void, value: *mut u16) -> HRESULT {
    with_network(this, 8, |_, spec| {
        spec.name = unsafe { read_bstr(value) };
        S_OK
    })
}

unsafe extern "system" fn network_get_description(
    this: *mut c_void,
    out: *mut *mut u16,
) -> HRESULT {
    with_network(this, 9, |_, spec| {
        unsafe { *out = sys::bstr_alloc(&spec.description) };
        S_OK
    })
}

unsafe extern "system" fn network_set_description(this: *mut c_void, value: *mut u16) -> HRESULT {
    with_network(this, 10, |_, spec| {
        spec.description = unsafe { read_bstr(value) };
        S_OK
    })
}

unsafe extern "system" fn network_get_id(this: *mut c_void, out: *mut GUID) -> HRESULT {
    with_network(this, 11, |_, spec| {
        unsafe { *out = uuid_to_guid(spec.id) };
        S_OK
    })
}

unsafe extern "system" fn network_get_domain_type(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_network(this, 12, |_, spec| {
        unsafe { *out = spec.domain_type };
        S_OK
    })
}

unsafe extern "system" fn network_get_connections(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    with_network(this, 13, |object, spec| {
        let parent = NetworkSpec {
            connections: Vec::new(),
            ..spec.clone()
        };
        let steps = spec
            .connections
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.network.get_or_insert_with(|| Box::new(parent.clone()));
                EnumStep::dispatch(fake_connection(&object.tracker, c))
            })
            .collect();
        let collection =
            collection_of(&object.tracker, &format!("{}.connections", spec.name), steps, false);
        unsafe { *out = collection.into_raw() };
        S_OK
    })
}

unsafe extern "system" fn network_get_times(
    this: *mut c_void,
    created_low: *mut u32,
    created_high: *mut u32,
    connected_low: *mut u32,
    connected_high: *mut u32,
) -> HRESULT {
    with_network(this, 14, |_, spec| {
        unsafe {
            *created_low = spec.created as u32;
            *created_high = (spec.created >> 32) as u32;
            *connected_low = spec.connected_at as u32;
            *connected_high = (spec.connected_at >> 32) as u32;
        }
        S_OK
    })
}

unsafe extern "system" fn network_is_internet(this: *mut c_void, out: *mut VariantBool) -> HRESULT {
    with_network(this, 15, |_, spec| {
        bool_out(out, spec.internet);
        S_OK
    })
}

unsafe extern "system" fn network_is_connected(
    this: *mut c_void,
    out: *mut VariantBool,
) -> HRESULT {
    with_network(this, 16, |_, spec| {
        bool_out(out, spec.connected);
        S_OK
    })
}

unsafe extern "system" fn network_get_connectivity(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_network(this, 17, |_, spec| {
        unsafe { *out = spec.connectivity };
        S_OK
    })
}

unsafe extern "system" fn network_get_category(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_network(this, 18, |_, spec| {
        unsafe { *out = spec.category };
        S_OK
    })
}

unsafe extern "system" fn network_set_category(this: *mut c_void, value: i32) -> HRESULT {
    with_network(this, 19, |_, spec| {
        spec.category = value;
        S_OK
    })
}

/// A fake `INetwork` named after `spec.name`.
pub fn fake_network(tracker: &Tracker, spec: NetworkSpec) -> ComObject {
    let mut builder = FakeBuilder::new(tracker, spec.name.clone())
        .interface(IID_IDISPATCH)
        .interface(IID_INETWORK)
        .slot(7, network_get_name as StringOutFn as *const c_void)
        .slot(8, network_set_name as StringInFn as *const c_void)
        .slot(9, network_get_description as StringOutFn as *const c_void)
        .slot(10, network_set_description as StringInFn as *const c_void)
        .slot(11, network_get_id as GuidOutFn as *const c_void)
        .slot(12, network_get_domain_type as I32OutFn as *const c_void)
        .slot(13, network_get_connections as ObjectOutFn as *const c_void)
        .slot(14, network_get_times as TimesFn as *const c_void)
        .slot(15, network_is_internet as BoolOutFn as *const c_void)
        .slot(16, network_is_connected as BoolOutFn as *const c_void)
        .slot(17, network_get_connectivity as I32OutFn as *const c_void)
        .slot(18, network_get_category as I32OutFn as *const c_void)
        .slot(19, network_set_category as I32InFn as *const c_void);
    for (slot, status) in &spec.failures {
        builder = builder.fail(*slot, *status);
    }
    builder.behavior(Behavior::Network(Mutex::new(spec))).build()
}

unsafe extern "system" fn connection_get_network(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    with_connection(this, 7, |object, spec| match &spec.network {
        Some(network) => {
            let network = fake_network(&object.tracker, (**network).clone());
            unsafe { *out = network.into_raw() };
            S_OK
        }
        None => E_POINTER,
    })
}

unsafe extern "system" fn connection_is_internet(
    this: *mut c_void,
    out: *mut VariantBool,
) -> HRESULT {
    with_connection(this, 8, |_, spec| {
        bool_out(out, spec.internet);
        S_OK
    })
}

unsafe extern "system" fn connection_is_connected(
    this: *mut c_void,
    out: *mut VariantBool,
) -> HRESULT {
    with_connection(this, 9, |_, spec| {
        bool_out(out, spec.connected);
        S_OK
    })
}

unsafe extern "system" fn connection_get_connectivity(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_connection(this, 10, |_, spec| {
        unsafe { *out = spec.connectivity };
        S_OK
    })
}

unsafe extern "system" fn connection_get_id(this: *mut c_void, out: *mut GUID) -> HRESULT {
    with_connection(this, 11, |_, spec| {
        unsafe { *out = uuid_to_guid(spec.id) };
        S_OK
    })
}

unsafe extern "system" fn connection_get_adapter_id(this: *mut c_void, out: *mut GUID) -> HRESULT {
    with_connection(this, 12, |_, spec| {
        unsafe { *out = uuid_to_guid(spec.adapter_id) };
        S_OK
    })
}

unsafe extern "system" fn connection_get_domain_type(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_connection(this, 13, |_, spec| {
        unsafe { *out = spec.domain_type };
        S_OK
    })
}

/// A fake `INetworkConnection` named after `spec.label`.
pub fn fake_connection(tracker: &Tracker, spec: ConnectionSpec) -> ComObject {
    let mut builder = FakeBuilder::new(tracker, spec.label.clone())
        .interface(IID_IDISPATCH)
        .interface(IID_INETWORK_CONNECTION)
        .slot(7, connection_get_network as ObjectOutFn as *const c_void)
        .slot(8, connection_is_internet as BoolOutFn as *const c_void)
        .slot(9, connection_is_connected as BoolOutFn as *const c_void)
        .slot(10, connection_get_connectivity as I32OutFn as *const c_void)
        .slot(11, connection_get_id as GuidOutFn as *const c_void)
        .slot(12, connection_get_adapter_id as GuidOutFn as *const c_void)
        .slot(13, connection_get_domain_type as I32OutFn as *const c_void);
    for (slot, status) in &spec.failures {
        builder = builder.fail(*slot, *status);
    }
    builder.behavior(Behavior::Connection(spec)).build()
}

fn all_connections(spec: &ManagerSpec) -> impl Iterator<Item = ConnectionSpec> + '_ {
    spec.networks.iter().flat_map(|network| {
        let parent = NetworkSpec {
            connections: Vec::new(),
            ..network.clone()
        };
        network.connections.iter().map(move |c| {
            let mut c = c.clone();
            c.network.get_or_insert_with(|| Box::new(parent.clone()));
            c
        })
    })
}

type GetNetworksFn = unsafe extern "system" fn(*mut c_void, i32, *mut *mut c_void) -> HRESULT;
type GetByIdFn = unsafe extern "system" fn(*mut c_void, GUID, *mut *mut c_void) -> HRESULT;

unsafe extern "system" fn manager_get_networks(
    this: *mut c_void,
    flags: i32,
    out: *mut *mut c_void,
) -> HRESULT {
    with_manager(this, 7, |object, spec| {
        let steps = spec
            .networks
            .iter()
            .filter(|n| (n.connected && flags & 1 != 0) || (!n.connected && flags & 2 != 0))
            .map(|n| EnumStep::dispatch(fake_network(&object.tracker, n.clone())))
            .collect();
        let collection = collection_of(&object.tracker, "networks", steps, spec.direct_collections);
        unsafe { *out = collection.into_raw() };
        S_OK
    })
}

unsafe extern "system" fn manager_get_network(
    this: *mut c_void,
    id: GUID,
    out: *mut *mut c_void,
) -> HRESULT {
    with_manager(this, 8, |object, spec| {
        let id = guid_to_uuid(id);
        match spec.networks.iter().find(|n| n.id == id) {
            Some(n) => {
                unsafe { *out = fake_network(&object.tracker, n.clone()).into_raw() };
                S_OK
            }
            None => E_ELEMENT_NOT_FOUND,
        }
    })
}

unsafe extern "system" fn manager_get_connections(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    with_manager(this, 9, |object, spec| {
        let steps = all_connections(spec)
            .map(|c| EnumStep::dispatch(fake_connection(&object.tracker, c)))
            .collect();
        let collection =
            collection_of(&object.tracker, "connections", steps, spec.direct_collections);
        unsafe { *out = collection.into_raw() };
        S_OK
    })
}

unsafe extern "system" fn manager_get_connection(
    this: *mut c_void,
    id: GUID,
    out: *mut *mut c_void,
) -> HRESULT {
    with_manager(this, 10, |object, spec| {
        let id = guid_to_uuid(id);
        match all_connections(spec).find(|c| c.id == id) {
            Some(c) => {
                unsafe { *out = fake_connection(&object.tracker, c).into_raw() };
                S_OK
            }
            None => E_ELEMENT_NOT_FOUND,
        }
    })
}

unsafe extern "system" fn manager_is_internet(this: *mut c_void, out: *mut VariantBool) -> HRESULT {
    with_manager(this, 11, |_, spec| {
        bool_out(out, spec.internet);
        S_OK
    })
}

unsafe extern "system" fn manager_is_connected(
    this: *mut c_void,
    out: *mut VariantBool,
) -> HRESULT {
    with_manager(this, 12, |_, spec| {
        bool_out(out, spec.connected);
        S_OK
    })
}

unsafe extern "system" fn manager_get_connectivity(this: *mut c_void, out: *mut i32) -> HRESULT {
    with_manager(this, 13, |_, spec| {
        unsafe { *out = spec.connectivity };
        S_OK
    })
}

/// A fake `INetworkListManager` called `manager`.
pub fn fake_manager(tracker: &Tracker, spec: ManagerSpec) -> ComObject {
    FakeBuilder::new(tracker, "manager")
        .interface(IID_IDISPATCH)
        .interface(IID_INETWORK_LIST_MANAGER)
        .slot(7, manager_get_networks as GetNetworksFn as *const c_void)
        .slot(8, manager_get_network as GetByIdFn as *const c_void)
        .slot(9, manager_get_connections as ObjectOutFn as *const c_void)
        .slot(10, manager_get_connection as GetByIdFn as *const c_void)
        .slot(11, manager_is_internet as BoolOutFn as *const c_void)
        .slot(12, manager_is_connected as BoolOutFn as *const c_void)
        .slot(13, manager_get_connectivity as I32OutFn as *const c_void)
        .behavior(Behavior::Manager(spec))
        .build()
}

// ── IQueryAssociations ──────────────────────────────────────────────

/// Scripted state of a fake `IQueryAssociations`.
#[derive(Debug, Clone, Default)]
pub struct AssociationSpec {
    /// `(association, ASSOCSTR)` → value.
    pub strings: HashMap<(String, i32), String>,
    pub initialized: Option<String>,
}

impl AssociationSpec {
    pub fn with(mut self, association: &str, kind: i32, value: &str) -> Self {
        self.strings
            .insert((association.to_lowercase(), kind), value.to_string());
        self
    }
}

type AssocInitFn =
    unsafe extern "system" fn(*mut c_void, u32, *const u16, *mut c_void, *mut c_void) -> HRESULT;
type AssocGetStringFn =
    unsafe extern "system" fn(*mut c_void, u32, i32, *const u16, *mut u16, *mut u32) -> HRESULT;

unsafe fn read_wide(value: *const u16) -> String {
    if value.is_null() {
        return String::new();
    }
    let mut len = 0;
    while unsafe { *value.add(len) } != 0 {
        len += 1;
    }
    String::from_utf16_lossy(unsafe { std::slice::from_raw_parts(value, len) })
}

unsafe extern "system" fn assoc_init(
    this: *mut c_void,
    _flags: u32,
    association: *const u16,
    _key: *mut c_void,
    _window: *mut c_void,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(3) {
        return hr;
    }
    let Behavior::Associations(spec) = &object.behavior else {
        return E_FAIL;
    };
    let association = unsafe { read_wide(association) }.to_lowercase();
    let mut spec = lock(spec);
    if !spec.strings.keys().any(|(a, _)| *a == association) {
        return E_NO_ASSOCIATION;
    }
    spec.initialized = Some(association);
    S_OK
}

unsafe extern "system" fn assoc_get_string(
    this: *mut c_void,
    _flags: u32,
    kind: i32,
    _extra: *const u16,
    out: *mut u16,
    len: *mut u32,
) -> HRESULT {
    let object = unsafe { FakeObject::from_this(this) };
    if let Some(hr) = object.enter(4) {
        return hr;
    }
    let Behavior::Associations(spec) = &object.behavior else {
        return E_FAIL;
    };
    let spec = lock(spec);
    let Some(association) = &spec.initialized else {
        return E_FAIL;
    };
    let Some(value) = spec.strings.get(&(association.clone(), kind)) else {
        return E_NO_ASSOCIATION;
    };
    let wide: Vec<u16> = value.encode_utf16().chain(Some(0)).collect();
    if out.is_null() {
        unsafe { *len = wide.len() as u32 };
        return S_FALSE;
    }
    if (unsafe { *len } as usize) < wide.len() {
        return E_POINTER;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(wide.as_ptr(), out, wide.len());
        *len = wide.len() as u32;
    }
    S_OK
}

/// A fake `IQueryAssociations` called `associations`.
pub fn fake_associations(tracker: &Tracker, spec: AssociationSpec) -> ComObject {
    FakeBuilder::new(tracker, "associations")
        .interface(IID_IQUERY_ASSOCIATIONS)
        .slot(3, assoc_init as AssocInitFn as *const c_void)
        .slot(4, assoc_get_string as AssocGetStringFn as *const c_void)
        .behavior(Behavior::Associations(Mutex::new(spec)))
        .build()
}

// ── Source ──────────────────────────────────────────────────────────

/// A [`ComSource`] that hands out fresh fakes built from its specs.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub tracker: Tracker,
    pub manager: ManagerSpec,
    pub associations: AssociationSpec,
}

impl ComSource for FakeSource {
    fn network_manager(&self) -> ComResult<NetworkListManager> {
        NetworkListManager::cast_from(&fake_manager(&self.tracker, self.manager.clone()))
    }

    fn associations(&self) -> ComResult<QueryAssociations> {
        QueryAssociations::cast_from(&fake_associations(&self.tracker, self.associations.clone()))
    }
}
