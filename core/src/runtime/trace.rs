use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::bytecode::{Bytecode, BytecodeArray};
use crate::value::Value;

const TRACE_TARGET: &str = "brisk::trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub function: Arc<str>,
    pub offset: usize,
    pub bytecode: &'static str,
    pub accumulator: String,
}

/// Sink for the Entry/Exit hooks. Purely observational.
#[derive(Debug, Default)]
pub struct Tracer {
    recording: bool,
    events: Vec<TraceEvent>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn record(&mut self, kind: TraceKind, bytecode_array: &BytecodeArray, offset: usize, accumulator: &Value) {
        let bytecode = bytecode_array
            .load_u8(offset)
            .map(Bytecode::from_byte)
            .unwrap_or(Bytecode::Illegal);
        trace!(
            target: TRACE_TARGET,
            kind = ?kind,
            function = bytecode_array.name(),
            offset,
            bytecode = bytecode.name(),
            accumulator = %accumulator,
            "bytecode trace"
        );
        if self.recording {
            self.events.push(TraceEvent {
                kind,
                function: Arc::clone(bytecode_array.name_arc()),
                offset,
                bytecode: bytecode.name(),
                accumulator: accumulator.to_string(),
            });
        }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }
}
