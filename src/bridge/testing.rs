// Scripted bridge for unit tests.
//
// Responses are keyed by the space-joined argument vector. Each key holds a
// queue; the last queued response repeats once the queue is drained. Unscripted
// calls succeed with empty output.

use super::{Bridge, ProbeResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct ScriptedBridge {
    responses: Mutex<HashMap<String, VecDeque<ProbeResult>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBridge {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, key: &str, result: ProbeResult) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, key: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == key).count()
    }
}

#[async_trait]
impl Bridge for ScriptedBridge {
    async fn execute(&self, args: &[String], _timeout: Duration) -> ProbeResult {
        let key = args.join(" ");
        self.calls.lock().unwrap().push(key.clone());

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| ProbeResult::ok("")),
            None => ProbeResult::ok(""),
        }
    }
}
