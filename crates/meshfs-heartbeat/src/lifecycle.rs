//! Lifecycle events published by the agent's worker task.

/// State transitions of the heartbeat worker, observable through a
/// `tokio::sync::watch` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The agent exists but its worker has not been started.
    Created,
    /// The worker task is running the periodic loop.
    Started,
    /// The worker exited cleanly after a shutdown.
    Stopped,
    /// The worker died with an unhandled failure.
    Crashed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_event_equality() {
        assert_eq!(LifecycleEvent::Started, LifecycleEvent::Started);
        assert_ne!(LifecycleEvent::Started, LifecycleEvent::Stopped);
        assert_eq!(
            LifecycleEvent::Crashed("boom".into()),
            LifecycleEvent::Crashed("boom".into())
        );
    }
}
