//! Control events and the handle platform callbacks use to deliver them.
//!
//! The master is confined to one control thread. Container, host and bridge
//! callbacks may fire anywhere, so they only enqueue a [`ControlEvent`];
//! [`Master::pump`](crate::Master::pump) applies them in order.

use bridge_traits::{ContainerId, HostId, HostLifecycle, PlayerState, RootId};
use tokio::sync::mpsc;

use crate::error::{OrchestratorError, Result};
use crate::selection::ContainerLayout;
use crate::types::SessionId;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    ContainerAttached {
        container: ContainerId,
        layout: ContainerLayout,
    },
    ContainerDetached {
        container: ContainerId,
    },
    ContainerLayout {
        container: ContainerId,
        layout: ContainerLayout,
    },
    HostLifecycle {
        host: HostId,
        state: HostLifecycle,
    },
    RootLifecycle {
        root: RootId,
        state: HostLifecycle,
    },
    BridgeState {
        session: SessionId,
        state: PlayerState,
    },
}

/// Cloneable, `Send` sender for control events.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: mpsc::UnboundedSender<ControlEvent>,
}

impl ControlHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self { sender }
    }

    pub fn send(&self, event: ControlEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| OrchestratorError::ControlChannelClosed)
    }

    pub fn container_attached(&self, container: ContainerId, layout: ContainerLayout) -> Result<()> {
        self.send(ControlEvent::ContainerAttached { container, layout })
    }

    pub fn container_detached(&self, container: ContainerId) -> Result<()> {
        self.send(ControlEvent::ContainerDetached { container })
    }

    pub fn container_layout(&self, container: ContainerId, layout: ContainerLayout) -> Result<()> {
        self.send(ControlEvent::ContainerLayout { container, layout })
    }

    pub fn host_lifecycle(&self, host: HostId, state: HostLifecycle) -> Result<()> {
        self.send(ControlEvent::HostLifecycle { host, state })
    }

    pub fn root_lifecycle(&self, root: RootId, state: HostLifecycle) -> Result<()> {
        self.send(ControlEvent::RootLifecycle { root, state })
    }

    pub fn bridge_state(&self, session: SessionId, state: PlayerState) -> Result<()> {
        self.send(ControlEvent::BridgeState { session, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let handle = ControlHandle::new(sender);
        let clone = handle.clone();

        handle.container_detached(ContainerId(1)).unwrap();
        clone
            .host_lifecycle(HostId(2), HostLifecycle::Resumed)
            .unwrap();

        assert_eq!(
            receiver.try_recv().unwrap(),
            ControlEvent::ContainerDetached {
                container: ContainerId(1)
            }
        );
        assert!(matches!(
            receiver.try_recv().unwrap(),
            ControlEvent::HostLifecycle { state: HostLifecycle::Resumed, .. }
        ));
    }

    #[test]
    fn test_send_after_close_fails() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = ControlHandle::new(sender);
        drop(receiver);

        assert!(matches!(
            handle.root_lifecycle(RootId(1), HostLifecycle::Destroyed),
            Err(OrchestratorError::ControlChannelClosed)
        ));
    }

    #[test]
    fn test_handle_is_send() {
        fn assert_send<T: Send + Sync>() {}
        assert_send::<ControlHandle>();
    }
}
