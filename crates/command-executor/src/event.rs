//! Raw process events

/// A raw event from a process
#[derive(Debug, Clone)]
pub struct ProcessEvent {
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(event_type: ProcessEventType) -> Self {
        Self {
            event_type,
            data: None,
        }
    }

    /// Create a new process event carrying one line of output
    pub fn new_with_data(event_type: ProcessEventType, data: String) -> Self {
        Self {
            event_type,
            data: Some(data),
        }
    }
}

/// Types of raw process events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Process has started
    Started {
        /// OS process id
        pid: u32,
    },
    /// Line from stdout
    Stdout,
    /// Line from stderr
    Stderr,
}
