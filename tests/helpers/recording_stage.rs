//! A stage that records every message it is handed.

use bugsnag_link::{Message, Result, Stage};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct RecordingStage {
    pub received: Arc<Mutex<Vec<Option<Message>>>>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Option<Message>> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Stage for RecordingStage {
    fn name(&self) -> &str {
        "recording"
    }

    fn handle(&self, message: Option<&Message>) -> Result<()> {
        self.received.lock().unwrap().push(message.cloned());
        Ok(())
    }
}
