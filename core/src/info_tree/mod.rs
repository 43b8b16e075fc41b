//! Host and component tree rebuilt from the controller's `info` response.
//!
//! Each response is parsed into a fresh [`InfoTree`] and merged into the
//! previous one with [`merge_trees`]. Entries matched by the
//! [`IdentityRule`] keep their [`NodeId`], which is what consumers use to keep
//! selection and expansion state stable across refreshes.

mod parser;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

pub use parser::InfoTreeParser;
pub use parser::ParseStep;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a host or component entry across merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoTree {
    pub state_info: Option<String>,
    pub pause_info: Option<String>,
    pub console_logging_info: Option<String>,
    pub hosts: Vec<HostController>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostController {
    pub id: NodeId,
    pub ip_address: String,
    pub ip_number: Option<String>,
    pub host_name: Option<String>,
    pub operating_system: Option<String>,
    pub state: Option<String>,
    pub components: Vec<Component>,
}

impl HostController {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            ip_address: ip_address.into(),
            ip_number: None,
            host_name: None,
            operating_system: None,
            state: None,
            components: Vec::new(),
        }
    }

    /// Label shown for this host.
    pub fn display_name(&self) -> &str {
        self.host_name.as_deref().unwrap_or(&self.ip_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: NodeId,
    pub reference: String,
    pub name: Option<String>,
    pub component_type: Option<String>,
    pub state: Option<String>,
    pub executed_info: Option<String>,
    pub verdict: Option<String>,
}

impl Component {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            reference: reference.into(),
            name: None,
            component_type: None,
            state: None,
            executed_info: None,
            verdict: None,
        }
    }

    /// Label shown for this component.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.reference)
    }
}

/// Decides whether an old and a new entry describe the same thing.
pub trait IdentityRule {
    fn same_host(&self, old: &HostController, new: &HostController) -> bool;
    fn same_component(&self, old: &Component, new: &Component) -> bool;
}

/// Same address or same display name for hosts; same reference or same
/// display name for components.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdentity;

impl IdentityRule for DefaultIdentity {
    fn same_host(&self, old: &HostController, new: &HostController) -> bool {
        old.ip_address == new.ip_address || old.display_name() == new.display_name()
    }

    fn same_component(&self, old: &Component, new: &Component) -> bool {
        old.reference == new.reference || old.display_name() == new.display_name()
    }
}

/// Merges `new` into `old`. Matched entries keep the old id and position and
/// take every field from the new entry; unmatched old entries are dropped and
/// unmatched new entries are appended in their original order.
pub fn merge_trees(
    old: &InfoTree,
    new: InfoTree,
    identity: &(impl IdentityRule + ?Sized),
) -> InfoTree {
    InfoTree {
        state_info: new.state_info,
        pause_info: new.pause_info,
        console_logging_info: new.console_logging_info,
        hosts: merge_entries(
            &old.hosts,
            new.hosts,
            |o, n| identity.same_host(o, n),
            |o, mut n| {
                n.id = o.id;
                n.components = merge_entries(
                    &o.components,
                    n.components,
                    |oc, nc| identity.same_component(oc, nc),
                    |oc, mut nc| {
                        nc.id = oc.id;
                        nc
                    },
                );
                n
            },
        ),
    }
}

fn merge_entries<T>(
    old: &[T],
    new: Vec<T>,
    same: impl Fn(&T, &T) -> bool,
    combine: impl Fn(&T, T) -> T,
) -> Vec<T> {
    let mut fresh: Vec<Option<T>> = new.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(fresh.len());
    for old_entry in old {
        let matched = fresh
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|candidate| same(old_entry, candidate)))
            .and_then(Option::take);
        if let Some(new_entry) = matched {
            merged.push(combine(old_entry, new_entry));
        }
    }
    merged.extend(fresh.into_iter().flatten());
    merged
}
