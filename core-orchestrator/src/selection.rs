//! Selection policies.
//!
//! A policy looks at the containers of one manager and decides which
//! bindings are selected and where the distance anchor sits. The manager
//! turns that into distances and dispositions.

use bridge_traits::ContainerId;
use serde::{Deserialize, Serialize};

use crate::types::BindingId;

/// Layout facts reported by the client's list glue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerLayout {
    /// Position of the container in its list.
    pub ordinal: i64,
    /// Visible part of the container, `0.0..=1.0`.
    pub visible_fraction: f32,
}

impl ContainerLayout {
    pub fn new(ordinal: i64, visible_fraction: f32) -> Self {
        Self {
            ordinal,
            visible_fraction,
        }
    }
}

/// One binding as seen by a selection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub binding: BindingId,
    pub container: ContainerId,
    pub attached: bool,
    pub layout: Option<ContainerLayout>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub selected: Vec<BindingId>,
    /// Ordinal distances are measured from.
    pub anchor: Option<i64>,
}

pub trait SelectionPolicy: Send + Sync {
    fn select(&self, candidates: &[Candidate], visibility_threshold: f32) -> Selection;
}

/// Select the single most visible attached container.
///
/// Ties go to the lowest ordinal. When no container reaches the threshold
/// nothing is selected, but the most visible attached container still
/// anchors distances.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostVisible;

impl SelectionPolicy for MostVisible {
    fn select(&self, candidates: &[Candidate], visibility_threshold: f32) -> Selection {
        let best = candidates
            .iter()
            .filter(|candidate| candidate.attached)
            .filter_map(|candidate| candidate.layout.map(|layout| (candidate, layout)))
            .max_by(|(_, a), (_, b)| {
                a.visible_fraction
                    .total_cmp(&b.visible_fraction)
                    .then_with(|| b.ordinal.cmp(&a.ordinal))
            });

        match best {
            Some((candidate, layout)) if layout.visible_fraction >= visibility_threshold => {
                Selection {
                    selected: vec![candidate.binding],
                    anchor: Some(layout.ordinal),
                }
            }
            Some((_, layout)) => Selection {
                selected: Vec::new(),
                anchor: Some(layout.ordinal),
            },
            None => Selection::default(),
        }
    }
}
