//! Resource bindings: constant buffers, samplers, shader-resource views and
//! unordered-access views.
//!
//! Each category is an append-only list. The index of a resource is its
//! insertion position and doubles as its ID; it stays valid for the lifetime of
//! the module, even after other resources of the same category are removed.
use std::collections::{BTreeMap, btree_map::Entry};

use hlinstr::module::{GlobalId, Module};
use log::debug;

use crate::{
    dxil::{CompType, ResourceClass, ResourceKind, SamplerKind},
    utils::error::{HlError, HlResult},
};

/// Range size of an unbounded resource array.
pub const UNBOUNDED_RANGE: u32 = u32::MAX;

/// Binding information shared by every resource category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBase {
    pub id: u32,
    /// Global variable standing for the resource in the host module.
    pub global: GlobalId,
    pub name: String,
    pub space: u32,
    pub lower_bound: u32,
    pub range_size: u32,
}

impl ResourceBase {
    /// A single-register binding at `space0`, register 0.
    pub fn new(global: GlobalId, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            global,
            name: name.into(),
            space: 0,
            lower_bound: 0,
            range_size: 1,
        }
    }

    pub fn with_binding(mut self, space: u32, lower_bound: u32, range_size: u32) -> Self {
        self.space = space;
        self.lower_bound = lower_bound;
        self.range_size = range_size;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.range_size == UNBOUNDED_RANGE
    }

    /// Last register covered by the binding, or `None` when unbounded.
    pub fn upper_bound(&self) -> Option<u32> {
        if self.is_unbounded() {
            None
        } else {
            Some(
                self.lower_bound
                    .saturating_add(self.range_size.saturating_sub(1)),
            )
        }
    }
}

/// Access to the common part of a resource record.
pub trait AsResourceBase {
    fn base(&self) -> &ResourceBase;
    fn base_mut(&mut self) -> &mut ResourceBase;
}

macro_rules! impl_as_resource_base {
    ($($ty:ty),*) => {
        $(
            impl AsResourceBase for $ty {
                fn base(&self) -> &ResourceBase {
                    &self.base
                }

                fn base_mut(&mut self) -> &mut ResourceBase {
                    &mut self.base
                }
            }
        )*
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBuffer {
    pub base: ResourceBase,
    pub size_in_bytes: u32,
}

impl CBuffer {
    pub fn new(base: ResourceBase, size_in_bytes: u32) -> Self {
        Self {
            base,
            size_in_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sampler {
    pub base: ResourceBase,
    pub sampler_kind: SamplerKind,
}

impl Sampler {
    pub fn new(base: ResourceBase, sampler_kind: SamplerKind) -> Self {
        Self { base, sampler_kind }
    }
}

/// A texture or buffer view, used for both SRVs and UAVs.
///
/// `globally_coherent`, `has_counter` and `rov` are only meaningful for UAVs
/// and are not persisted for SRVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlResource {
    pub base: ResourceBase,
    pub kind: ResourceKind,
    /// Element type of typed buffers and textures.
    pub comp_type: CompType,
    /// Element stride of structured buffers, in bytes.
    pub stride: u32,
    pub sample_count: u32,
    pub globally_coherent: bool,
    pub has_counter: bool,
    pub rov: bool,
}

impl HlResource {
    pub fn new(base: ResourceBase, kind: ResourceKind) -> Self {
        Self {
            base,
            kind,
            comp_type: CompType::Invalid,
            stride: 0,
            sample_count: 0,
            globally_coherent: false,
            has_counter: false,
            rov: false,
        }
    }
}

impl_as_resource_base!(CBuffer, Sampler, HlResource);

/// Append-only list of resources of one category. Removed entries leave a
/// hole so later entries keep their index, and their index is never handed
/// out again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceList<T> {
    class: ResourceClass,
    /// Number of indices handed out so far.
    allocated: u32,
    entries: BTreeMap<u32, T>,
}

impl<T: AsResourceBase> ResourceList<T> {
    fn new(class: ResourceClass) -> Self {
        Self {
            class,
            allocated: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Number of indices handed out so far, removed entries included.
    pub fn len(&self) -> usize {
        self.allocated as usize
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Number of resources still present.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, mut resource: T) -> u32 {
        let id = self.allocated;
        resource.base_mut().id = id;
        self.entries.insert(id, resource);
        self.allocated += 1;
        id
    }

    /// Start restoring a list that had handed out `allocated` indices.
    /// Existing entries are dropped.
    pub(crate) fn reset_allocated(&mut self, allocated: u32) {
        self.entries.clear();
        self.allocated = allocated;
    }

    /// Put back a resource at the index recorded in its ID. The index must lie
    /// within the allocated range and be free.
    pub(crate) fn restore(&mut self, resource: T) -> HlResult<()> {
        let id = resource.base().id;
        if id >= self.allocated {
            return Err(HlError::malformed(
                <&'static str>::from(self.class),
                format!(
                    "resource ID {} out of range for {} allocated indices",
                    id, self.allocated
                ),
            ));
        }
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(HlError::malformed(
                <&'static str>::from(self.class),
                format!("duplicate ID {}", id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(resource);
                Ok(())
            }
        }
    }

    fn out_of_range(&self, index: u32) -> HlError {
        HlError::IndexOutOfRange {
            what: self.class.into(),
            index,
            len: self.len(),
        }
    }

    pub fn get(&self, index: u32) -> HlResult<&T> {
        self.entries
            .get(&index)
            .ok_or_else(|| self.out_of_range(index))
    }

    pub fn get_mut(&mut self, index: u32) -> HlResult<&mut T> {
        let err = self.out_of_range(index);
        self.entries.get_mut(&index).ok_or(err)
    }

    /// Iterate over live resources in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn find_by_global(&self, global: GlobalId) -> Option<&T> {
        self.iter().find(|res| res.base().global == global)
    }

    /// Remove every resource bound to `global`, returning how many were
    /// removed.
    fn remove_global(&mut self, global: GlobalId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, res| res.base().global != global);
        before - self.entries.len()
    }

    fn clear(&mut self) {
        self.reset_allocated(0);
    }
}

/// The four resource categories of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRegistry {
    cbuffers: ResourceList<CBuffer>,
    samplers: ResourceList<Sampler>,
    srvs: ResourceList<HlResource>,
    uavs: ResourceList<HlResource>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self {
            cbuffers: ResourceList::new(ResourceClass::CBuffer),
            samplers: ResourceList::new(ResourceClass::Sampler),
            srvs: ResourceList::new(ResourceClass::SRV),
            uavs: ResourceList::new(ResourceClass::UAV),
        }
    }
}

impl ResourceRegistry {
    pub fn add_cbuffer(&mut self, cbuffer: CBuffer) -> u32 {
        let id = self.cbuffers.push(cbuffer);
        debug!("Registered cbuffer #{}", id);
        id
    }

    pub fn add_sampler(&mut self, sampler: Sampler) -> u32 {
        let id = self.samplers.push(sampler);
        debug!("Registered sampler #{}", id);
        id
    }

    pub fn add_srv(&mut self, srv: HlResource) -> u32 {
        let id = self.srvs.push(srv);
        debug!("Registered SRV #{}", id);
        id
    }

    pub fn add_uav(&mut self, uav: HlResource) -> u32 {
        let id = self.uavs.push(uav);
        debug!("Registered UAV #{}", id);
        id
    }

    pub fn cbuffer(&self, index: u32) -> HlResult<&CBuffer> {
        self.cbuffers.get(index)
    }

    pub fn cbuffer_mut(&mut self, index: u32) -> HlResult<&mut CBuffer> {
        self.cbuffers.get_mut(index)
    }

    pub fn sampler(&self, index: u32) -> HlResult<&Sampler> {
        self.samplers.get(index)
    }

    pub fn sampler_mut(&mut self, index: u32) -> HlResult<&mut Sampler> {
        self.samplers.get_mut(index)
    }

    pub fn srv(&self, index: u32) -> HlResult<&HlResource> {
        self.srvs.get(index)
    }

    pub fn srv_mut(&mut self, index: u32) -> HlResult<&mut HlResource> {
        self.srvs.get_mut(index)
    }

    pub fn uav(&self, index: u32) -> HlResult<&HlResource> {
        self.uavs.get(index)
    }

    pub fn uav_mut(&mut self, index: u32) -> HlResult<&mut HlResource> {
        self.uavs.get_mut(index)
    }

    pub fn cbuffers(&self) -> &ResourceList<CBuffer> {
        &self.cbuffers
    }

    pub fn samplers(&self) -> &ResourceList<Sampler> {
        &self.samplers
    }

    pub fn srvs(&self) -> &ResourceList<HlResource> {
        &self.srvs
    }

    pub fn uavs(&self) -> &ResourceList<HlResource> {
        &self.uavs
    }

    pub(crate) fn lists_mut(
        &mut self,
    ) -> (
        &mut ResourceList<HlResource>,
        &mut ResourceList<HlResource>,
        &mut ResourceList<CBuffer>,
        &mut ResourceList<Sampler>,
    ) {
        (
            &mut self.srvs,
            &mut self.uavs,
            &mut self.cbuffers,
            &mut self.samplers,
        )
    }

    /// Common binding data of the resource at `index` in `class`.
    pub fn base(&self, class: ResourceClass, index: u32) -> HlResult<&ResourceBase> {
        match class {
            ResourceClass::SRV => self.srvs.get(index).map(AsResourceBase::base),
            ResourceClass::UAV => self.uavs.get(index).map(AsResourceBase::base),
            ResourceClass::CBuffer => self.cbuffers.get(index).map(AsResourceBase::base),
            ResourceClass::Sampler => self.samplers.get(index).map(AsResourceBase::base),
            ResourceClass::Invalid => Err(HlError::IndexOutOfRange {
                what: class.into(),
                index,
                len: 0,
            }),
        }
    }

    /// Whether any resource is bound to `global`.
    pub fn references(&self, global: GlobalId) -> bool {
        self.srvs.find_by_global(global).is_some()
            || self.uavs.find_by_global(global).is_some()
            || self.cbuffers.find_by_global(global).is_some()
            || self.samplers.find_by_global(global).is_some()
    }

    /// Remove the resources bound to any of `globals`, in all four categories,
    /// and detach those globals from `module`. Globals without a resource are
    /// left alone. Returns the number of removed resources.
    pub fn remove_resources(&mut self, module: &mut Module, globals: &[GlobalId]) -> usize {
        let mut total = 0;
        for &global in globals {
            let removed = self.srvs.remove_global(global)
                + self.uavs.remove_global(global)
                + self.cbuffers.remove_global(global)
                + self.samplers.remove_global(global);

            if removed > 0 {
                module.remove_global(global);
                total += removed;
            }
        }
        debug!(
            "Removed {} resources out of a batch of {} globals",
            total,
            globals.len()
        );
        total
    }

    pub fn is_empty(&self) -> bool {
        self.srvs.is_empty()
            && self.uavs.is_empty()
            && self.cbuffers.is_empty()
            && self.samplers.is_empty()
    }

    pub fn clear(&mut self) {
        self.srvs.clear();
        self.uavs.clear();
        self.cbuffers.clear();
        self.samplers.clear();
    }
}
