//! # Manager
//!
//! One manager per host. It owns the bindings created under the host and
//! plans their activation on every refresh.
//!
//! Planning is a pure function of the bindings' inputs, the selection policy
//! and the effective memory mode. [`Master`](crate::Master) applies the
//! resulting steps to sessions and renderers.
//!
//! ## Eviction
//!
//! | mode     | distance 1 | 2..=threshold | beyond |
//! |----------|------------|---------------|--------|
//! | Low      | release    | release       | release |
//! | Normal   | reset      | release       | release |
//! | Balanced | pause      | release       | release |
//! | High     | reset      | reset         | release |
//! | Infinite | pause      | pause         | pause   |

use bridge_traits::{ContainerId, Host, HostId, HostLifecycle};
use core_runtime::config::MemoryMode;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::binding::{ControllerPolicy, Disposition, Retention};
use crate::selection::{Candidate, ContainerLayout, SelectionPolicy};
use crate::types::{BindingId, GroupId, ManagerId, PlaybackIntent, Tag};

/// Distance of a binding nobody anchors.
pub const FAR: u32 = u32::MAX;

pub struct Manager {
    id: ManagerId,
    group: GroupId,
    host_id: HostId,
    host: Arc<dyn Host>,
    pub(crate) bindings: BTreeMap<ContainerId, BindingId>,
    pub(crate) memory_mode: MemoryMode,
    pub(crate) lifecycle: HostLifecycle,
    pub(crate) sticky: Option<BindingId>,
}

impl Manager {
    pub(crate) fn new(group: GroupId, host: Arc<dyn Host>, memory_mode: MemoryMode) -> Self {
        Self {
            id: ManagerId::new(),
            group,
            host_id: host.id(),
            host,
            bindings: BTreeMap::new(),
            memory_mode,
            lifecycle: HostLifecycle::Created,
            sticky: None,
        }
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn claims(&self, container: &ContainerId) -> bool {
        self.host.claims(container)
    }

    pub fn memory_mode(&self) -> MemoryMode {
        self.memory_mode
    }

    pub fn lifecycle(&self) -> HostLifecycle {
        self.lifecycle
    }

    pub fn sticky(&self) -> Option<BindingId> {
        self.sticky
    }

    pub fn binding_for(&self, container: &ContainerId) -> Option<BindingId> {
        self.bindings.get(container).copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = BindingId> + '_ {
        self.bindings.values().copied()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Compute the disposition of every input binding.
    ///
    /// `mode` must already be resolved (never [`MemoryMode::Auto`]).
    pub fn plan(
        &self,
        inputs: &[PlanInput],
        policy: &dyn SelectionPolicy,
        context: &PlanContext,
    ) -> Vec<PlanStep> {
        let candidates: Vec<Candidate> = inputs
            .iter()
            .map(|input| Candidate {
                binding: input.binding,
                container: input.container,
                attached: input.attached,
                layout: input.layout,
            })
            .collect();

        let mut selection = policy.select(&candidates, context.visibility_threshold);
        if context.selection_suppressed {
            selection.selected.clear();
        }

        let sticky = self
            .sticky
            .filter(|sticky| inputs.iter().any(|input| input.binding == *sticky && input.attached));
        let selected: HashSet<BindingId> = match sticky {
            Some(sticky) => std::iter::once(sticky).collect(),
            None => selection.selected.iter().copied().collect(),
        };

        let host_alive = matches!(
            context.host_state,
            HostLifecycle::Created
                | HostLifecycle::Started
                | HostLifecycle::Resumed
                | HostLifecycle::Paused
        );
        let foreground = context.host_state.is_foreground();

        inputs
            .iter()
            .map(|input| {
                let is_selected = selected.contains(&input.binding);
                let distance = if !input.attached {
                    FAR
                } else if is_selected || self.sticky == Some(input.binding) {
                    0
                } else {
                    match (selection.anchor, input.layout) {
                        (Some(anchor), Some(layout)) => distance(layout.ordinal, anchor),
                        _ => FAR,
                    }
                };

                let disposition = if !host_alive {
                    Disposition::Deactivate(Retention::Release)
                } else if is_selected && input.attached {
                    Disposition::Activate {
                        play: foreground && should_play(input),
                    }
                } else if input.client_started && input.attached && foreground {
                    Disposition::Activate { play: true }
                } else {
                    Disposition::Deactivate(retention_for(
                        context.mode,
                        distance,
                        context.high_mode_reset_distance,
                    ))
                };

                PlanStep {
                    binding: input.binding,
                    distance,
                    disposition,
                }
            })
            .collect()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("id", &self.id)
            .field("host", &self.host_id)
            .field("bindings", &self.bindings.len())
            .field("memory_mode", &self.memory_mode)
            .field("lifecycle", &self.lifecycle)
            .field("sticky", &self.sticky)
            .finish()
    }
}

/// Scheduler view of one binding.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanInput {
    pub binding: BindingId,
    pub container: ContainerId,
    pub attached: bool,
    pub layout: Option<ContainerLayout>,
    pub tag: Tag,
    pub controller: Option<ControllerPolicy>,
    pub intent: Option<PlaybackIntent>,
    pub client_started: bool,
}

/// Manager-wide facts for one refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanContext {
    pub mode: MemoryMode,
    pub host_state: HostLifecycle,
    pub high_mode_reset_distance: u32,
    pub visibility_threshold: f32,
    /// Another manager of the group is pinned.
    pub selection_suppressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    pub binding: BindingId,
    pub distance: u32,
    pub disposition: Disposition,
}

/// Ordinal distance from the anchor, at least 1 for unselected bindings.
pub fn distance(ordinal: i64, anchor: i64) -> u32 {
    let delta = ordinal.abs_diff(anchor);
    u32::try_from(delta).unwrap_or(FAR).max(1)
}

/// Retention of an unselected binding at `distance`.
pub fn retention_for(mode: MemoryMode, distance: u32, high_threshold: u32) -> Retention {
    match mode {
        MemoryMode::Infinite => Retention::Pause,
        MemoryMode::High if distance <= high_threshold => Retention::Reset,
        MemoryMode::Normal if distance == 1 => Retention::Reset,
        MemoryMode::Balanced if distance == 1 => Retention::Pause,
        _ => Retention::Release,
    }
}

/// Whether an activatable binding should be playing.
pub fn should_play(input: &PlanInput) -> bool {
    let Some(controller) = input.controller else {
        return true;
    };
    if input.tag.is_sentinel() {
        return true;
    }
    match input.intent {
        Some(PlaybackIntent::Pause) => false,
        Some(PlaybackIntent::Play) => true,
        None => controller.scheduler_can_start,
    }
}
