//! Scripted in-memory transports for tests.
//!
//! Both mocks record everything the bridge puts on the wire and replay
//! canned responses in order. They are `Clone` with shared state so a test
//! can keep one handle while the bridge worker owns the other, and an
//! exhausted response script reads back as an empty line, which is exactly
//! how a silent device looks to the protocol layer.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{InstrumentPort, WireTransport};

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Default)]
struct MockWireState {
    sent: Vec<String>,
    responses: VecDeque<String>,
}

/// Line-oriented mock implementing [`WireTransport`].
#[derive(Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<MockWireState>>,
}

impl MockWire {
    /// An empty mock: records sends, replies with silence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response line (without terminator) for a future
    /// `read_line` call.
    pub fn enqueue_response(&self, line: &str) {
        relock(&self.state).responses.push_back(line.to_string());
    }

    /// Frames sent by the bridge so far, in order.
    pub fn sent(&self) -> Vec<String> {
        relock(&self.state).sent.clone()
    }
}

#[async_trait]
impl WireTransport for MockWire {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        relock(&self.state)
            .sent
            .push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        Ok(relock(&self.state).responses.pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct MockPortState {
    writes: Vec<String>,
    queries: Vec<String>,
    replies: VecDeque<String>,
}

/// Command/response mock implementing [`InstrumentPort`].
#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockPortState>>,
}

impl MockPort {
    /// An empty mock: records traffic, answers queries with silence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for a future `query` call.
    pub fn enqueue_reply(&self, reply: &str) {
        relock(&self.state).replies.push_back(reply.to_string());
    }

    /// Fire-and-forget commands received so far.
    pub fn writes(&self) -> Vec<String> {
        relock(&self.state).writes.clone()
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        relock(&self.state).queries.clone()
    }
}

#[async_trait]
impl InstrumentPort for MockPort {
    async fn write(&mut self, message: &str) -> Result<()> {
        relock(&self.state).writes.push(message.to_string());
        Ok(())
    }

    async fn query(&mut self, message: &str, max_len: usize) -> Result<String> {
        let mut state = relock(&self.state);
        state.queries.push(message.to_string());
        let mut reply = state.replies.pop_front().unwrap_or_default();
        reply.truncate(max_len);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wire_replays_responses_in_order() {
        let mock = MockWire::new();
        mock.enqueue_response("first");
        mock.enqueue_response("second");

        let mut wire = mock.clone();
        wire.send(b"hello\n").await.unwrap();
        assert_eq!(wire.read_line().await.unwrap(), "first");
        assert_eq!(wire.read_line().await.unwrap(), "second");
        // Exhausted script looks like a silent device.
        assert_eq!(wire.read_line().await.unwrap(), "");
        assert_eq!(mock.sent(), vec!["hello\n"]);
    }

    #[tokio::test]
    async fn port_separates_writes_from_queries() {
        let mock = MockPort::new();
        mock.enqueue_reply("42");

        let mut port = mock.clone();
        port.write("FREQ 1000").await.unwrap();
        assert_eq!(port.query("FREQ?", 8).await.unwrap(), "42");
        assert_eq!(mock.writes(), vec!["FREQ 1000"]);
        assert_eq!(mock.queries(), vec!["FREQ?"]);
    }
}
