//! In-memory collaborators for engine tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use replay_api::client::{Consumer, Poll, Producer};
use replay_api::error::ClientError;
use replay_api::progress::ProgressReporter;
use replay_api::record::OutboundMessage;

/// Replays a scripted sequence of poll results, then waits forever.
pub struct ScriptedConsumer {
    script: VecDeque<Result<Poll, ClientError>>,
    pub offsets: Vec<i64>,
}

impl ScriptedConsumer {
    pub fn new(script: impl IntoIterator<Item = Result<Poll, ClientError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            offsets: Vec::new(),
        }
    }

    pub fn messages(payloads: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self::new(payloads.into_iter().map(|p| Ok(Poll::Message(p))))
    }
}

impl Consumer for ScriptedConsumer {
    fn read_next(&mut self) -> Pin<Box<dyn Future<Output = Result<Poll, ClientError>> + Send + '_>> {
        Box::pin(async move {
            match self.script.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        })
    }

    fn set_offset(&mut self, offset: i64) -> Result<(), ClientError> {
        self.offsets.push(offset);
        Ok(())
    }
}

/// Keeps every published batch; optionally fails from the n-th call on.
#[derive(Clone, Default)]
pub struct CollectingProducer {
    pub batches: Arc<Mutex<Vec<Vec<OutboundMessage>>>>,
    fail_from_call: Option<usize>,
    calls: Arc<Mutex<usize>>,
}

impl CollectingProducer {
    pub fn failing_from(call: usize) -> Self {
        Self {
            fail_from_call: Some(call),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<OutboundMessage>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.batches()
            .into_iter()
            .flatten()
            .map(|m| m.payload)
            .collect()
    }
}

impl Producer for CollectingProducer {
    fn publish<'a>(
        &'a self,
        batch: &'a [OutboundMessage],
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_from_call.is_some_and(|n| call >= n) {
                return Err(ClientError::io("broker unavailable"));
            }
            self.batches.lock().unwrap().push(batch.to_vec());
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Total(u64),
    Add(u64),
    Set(u64),
    Close,
}

/// Progress reporter that logs every call.
#[derive(Clone, Default)]
pub struct ProgressLog(pub Arc<Mutex<Vec<ProgressEvent>>>);

impl ProgressLog {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> Box<dyn ProgressReporter> {
        Box::new(self.clone())
    }
}

impl ProgressReporter for ProgressLog {
    fn set_total(&mut self, total: u64) {
        self.0.lock().unwrap().push(ProgressEvent::Total(total));
    }

    fn add(&mut self, delta: u64) {
        self.0.lock().unwrap().push(ProgressEvent::Add(delta));
    }

    fn set(&mut self, current: u64) {
        self.0.lock().unwrap().push(ProgressEvent::Set(current));
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.0.lock().unwrap().push(ProgressEvent::Close);
        Ok(())
    }
}

/// Byte sink that can be read back after being moved into a config.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
