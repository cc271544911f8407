// packages/engine/src/recording/call_log.rs
//! Immutable records of intercepted calls

use crate::runtime::method::{Args, CallSite, Callback};
use crate::runtime::value::Value;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Next process-wide call sequence number
pub(crate) fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// One intercepted call as observed by its interception
#[derive(Debug, Clone)]
pub struct RecordedCall {
    sequence: u64,
    receiver: Value,
    call_site: CallSite,
    args: Args,
    callback: Option<Callback>,
    result: Option<Value>,
    recorded_at: DateTime<Utc>,
}

impl RecordedCall {
    pub(crate) fn new(
        sequence: u64,
        receiver: Value,
        call_site: CallSite,
        args: Args,
        callback: Option<Callback>,
        result: Option<Value>,
    ) -> Self {
        Self {
            sequence,
            receiver,
            call_site,
            args,
            callback,
            result,
            recorded_at: Utc::now(),
        }
    }

    /// Sequence number taken when the call started
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    /// Value the plan produced; `None` when no plan ran or the plan failed
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
