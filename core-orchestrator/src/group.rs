//! Root-scoped group of managers.

use bridge_traits::{ContainerKind, RendererProvider, RootId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{GroupId, ManagerId};

pub struct Group {
    id: GroupId,
    root: RootId,
    /// Registration order.
    pub(crate) managers: Vec<ManagerId>,
    pub(crate) sticky_manager: Option<ManagerId>,
    providers: HashMap<ContainerKind, Arc<dyn RendererProvider>>,
}

impl Group {
    pub(crate) fn new(root: RootId) -> Self {
        Self {
            id: GroupId::new(),
            root,
            managers: Vec::new(),
            sticky_manager: None,
            providers: HashMap::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn managers(&self) -> &[ManagerId] {
        &self.managers
    }

    pub fn sticky_manager(&self) -> Option<ManagerId> {
        self.sticky_manager
    }

    pub(crate) fn add_manager(&mut self, manager: ManagerId) {
        if !self.managers.contains(&manager) {
            self.managers.push(manager);
        }
    }

    pub(crate) fn remove_manager(&mut self, manager: ManagerId) {
        self.managers.retain(|id| *id != manager);
        if self.sticky_manager == Some(manager) {
            self.sticky_manager = None;
        }
    }

    pub(crate) fn stick(&mut self, manager: ManagerId) {
        self.sticky_manager = Some(manager);
    }

    pub(crate) fn unstick(&mut self, manager: ManagerId) {
        if self.sticky_manager == Some(manager) {
            self.sticky_manager = None;
        }
    }

    /// `true` when `manager` must not select because another one is pinned.
    pub fn suppresses(&self, manager: ManagerId) -> bool {
        matches!(self.sticky_manager, Some(sticky) if sticky != manager)
    }

    pub(crate) fn register_provider(
        &mut self,
        kind: ContainerKind,
        provider: Arc<dyn RendererProvider>,
    ) {
        self.providers.insert(kind, provider);
    }

    pub fn has_provider(&self, kind: &ContainerKind) -> bool {
        self.providers.contains_key(kind)
    }

    pub fn provider(&self, kind: &ContainerKind) -> Option<&Arc<dyn RendererProvider>> {
        self.providers.get(kind)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("managers", &self.managers)
            .field("sticky_manager", &self.sticky_manager)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticky_manager_suppresses_others() {
        let mut group = Group::new(RootId(1));
        let first = ManagerId::new();
        let second = ManagerId::new();
        group.add_manager(first);
        group.add_manager(second);
        group.add_manager(first);
        assert_eq!(group.managers(), &[first, second]);

        group.stick(second);
        assert!(group.suppresses(first));
        assert!(!group.suppresses(second));

        group.unstick(first);
        assert_eq!(group.sticky_manager(), Some(second));

        group.remove_manager(second);
        assert_eq!(group.sticky_manager(), None);
        assert!(!group.suppresses(first));
    }
}
