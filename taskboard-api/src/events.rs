//! Change events broadcast to GraphQL subscribers.

use taskboard_core::{Project, Task};
use tokio::sync::broadcast;
use tracing::debug;

/// Event emitted after a successful write.
#[derive(Debug, Clone)]
pub enum TaskboardEvent {
    ProjectCreated(Project),
    TaskCreated(Task),
}

impl TaskboardEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TaskboardEvent::ProjectCreated(_) => "project_created",
            TaskboardEvent::TaskCreated(_) => "task_created",
        }
    }
}

/// Fan-out channel for [`TaskboardEvent`]s.
///
/// Slow subscribers lag and miss events rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskboardEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: TaskboardEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => debug!(event_type, receivers, "Published event"),
            Err(_) => debug!(event_type, "No subscribers for event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskboardEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
