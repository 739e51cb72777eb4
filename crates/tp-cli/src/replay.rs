use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use tp_core::{
    BlockedChannel, ClassifierEvent, EventHub, RequestHandle, RequestRegistry, RequestScope, Topic,
    TrackingProtection,
};

use crate::rules::RulesFile;

/// One line of a replay trace.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    Shim {
        id: String,
        #[serde(default)]
        patterns: Vec<String>,
        #[serde(default)]
        not_hosts: Vec<String>,
    },
    Allow {
        id: String,
        #[serde(default)]
        patterns: Vec<String>,
        #[serde(default)]
        hosts: Vec<String>,
    },
    Revoke {
        id: String,
    },
    Shutdown,
    /// Hand a request handle to a consumer
    RegisterRequest {
        consumer: String,
        browser_id: u64,
        handle: u64,
        channel_id: u64,
    },
    Block {
        channel_id: u64,
        url: String,
        top_level_url: String,
    },
    StopRequest {
        channel_id: u64,
    },
    Query {
        consumer: String,
        browser_id: u64,
        handle: u64,
    },
}

/// Result of replaying one op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Done { line: usize },
    Failed { line: usize, message: String },
    Verdict { line: usize, channel_id: u64, action: Option<&'static str> },
    Unblocked { line: usize, handle: u64, value: bool },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done { line } => write!(f, "{:>4}: ok", line),
            Self::Failed { line, message } => write!(f, "{:>4}: error: {}", line, message),
            Self::Verdict { line, channel_id, action } => {
                write!(f, "{:>4}: channel {} -> {}", line, channel_id, action.unwrap_or("blocked"))
            }
            Self::Unblocked { line, handle, value } => {
                write!(f, "{:>4}: request {} unblocked = {}", line, handle, value)
            }
        }
    }
}

/// Event hub that only tracks and logs subscriptions.
#[derive(Debug, Default)]
pub struct LoggingHub {
    listening: HashSet<Topic>,
}

impl LoggingHub {
    pub fn is_listening(&self, topic: Topic) -> bool {
        self.listening.contains(&topic)
    }
}

impl EventHub for LoggingHub {
    fn add_listener(&mut self, topic: Topic) {
        debug!("subscribed to {:?}", topic);
        self.listening.insert(topic);
    }

    fn remove_listener(&mut self, topic: Topic) {
        debug!("unsubscribed from {:?}", topic);
        self.listening.remove(&topic);
    }
}

/// Counters printed after a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub ops: usize,
    pub blocks: usize,
    pub replaced: usize,
    pub allowed: usize,
    pub errors: usize,
}

pub struct Replay {
    engine: TrackingProtection<LoggingHub, RequestRegistry>,
    stats: ReplayStats,
}

impl Replay {
    pub fn new() -> Self {
        Self {
            engine: TrackingProtection::new(LoggingHub::default(), RequestRegistry::new()),
            stats: ReplayStats::default(),
        }
    }

    pub fn with_rules(rules: &RulesFile) -> Result<Self, String> {
        let mut replay = Self::new();
        rules.apply(replay.engine.manager_mut())?;
        Ok(replay)
    }

    pub fn engine(&self) -> &TrackingProtection<LoggingHub, RequestRegistry> {
        &self.engine
    }

    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Replay a JSON-lines trace. Blank lines and `#` comments are skipped.
    pub fn run(&mut self, trace: &str) -> Result<Vec<Outcome>, String> {
        let mut outcomes = Vec::new();
        for (idx, raw) in trace.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let op: TraceOp = serde_json::from_str(line)
                .map_err(|e| format!("Line {}: invalid trace op: {}", idx + 1, e))?;
            outcomes.push(self.apply(idx + 1, op));
        }
        Ok(outcomes)
    }

    pub fn apply(&mut self, line: usize, op: TraceOp) -> Outcome {
        self.stats.ops += 1;
        let outcome = match op {
            TraceOp::Shim { id, patterns, not_hosts } => {
                registration(line, self.engine.shim(&id, &patterns, &not_hosts))
            }
            TraceOp::Allow { id, patterns, hosts } => {
                registration(line, self.engine.allow(&id, &patterns, &hosts))
            }
            TraceOp::Revoke { id } => {
                self.engine.revoke(&id);
                Outcome::Done { line }
            }
            TraceOp::Shutdown => {
                self.engine.shutdown();
                Outcome::Done { line }
            }
            TraceOp::RegisterRequest {
                consumer,
                browser_id,
                handle,
                channel_id,
            } => {
                self.engine.resolver_mut().register(
                    RequestScope::new(consumer, browser_id),
                    RequestHandle(handle),
                    channel_id,
                );
                Outcome::Done { line }
            }
            TraceOp::Block {
                channel_id,
                url,
                top_level_url,
            } => {
                let channel = BlockedChannel::new(channel_id, url, top_level_url);
                let verdict = self.engine.observe(ClassifierEvent::BeforeBlockChannel(&channel));
                self.stats.blocks += 1;
                match verdict {
                    Some(tp_core::Unblock::Replace) => self.stats.replaced += 1,
                    Some(tp_core::Unblock::Allow) => self.stats.allowed += 1,
                    None => {}
                }
                Outcome::Verdict {
                    line,
                    channel_id,
                    action: verdict.map(|v| v.as_str()),
                }
            }
            TraceOp::StopRequest { channel_id } => {
                self.engine.observe(ClassifierEvent::RequestStopped { channel_id });
                self.engine.resolver_mut().forget_channel(channel_id);
                Outcome::Done { line }
            }
            TraceOp::Query {
                consumer,
                browser_id,
                handle,
            } => {
                let scope = RequestScope::new(consumer, browser_id);
                Outcome::Unblocked {
                    line,
                    handle,
                    value: self.engine.was_request_unblocked(RequestHandle(handle), &scope),
                }
            }
        };
        if matches!(outcome, Outcome::Failed { .. }) {
            self.stats.errors += 1;
        }
        outcome
    }
}

impl Default for Replay {
    fn default() -> Self {
        Self::new()
    }
}

fn registration(line: usize, result: Result<(), tp_core::PatternError>) -> Outcome {
    match result {
        Ok(()) => Outcome::Done { line },
        Err(e) => Outcome::Failed {
            line,
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"
# scenario A, then revoke
{"op":"shim","id":"ext1","patterns":["*://track.example/*"],"not_hosts":["safe.example"]}
{"op":"register_request","consumer":"ext1","browser_id":1,"handle":900,"channel_id":42}
{"op":"block","channel_id":42,"url":"https://track.example/a","top_level_url":"https://evil.example/"}
{"op":"query","consumer":"ext1","browser_id":1,"handle":900}
{"op":"block","channel_id":43,"url":"https://track.example/a","top_level_url":"https://safe.example/"}
{"op":"stop_request","channel_id":42}
{"op":"query","consumer":"ext1","browser_id":1,"handle":900}
{"op":"revoke","id":"ext1"}
{"op":"block","channel_id":44,"url":"https://track.example/a","top_level_url":"https://evil.example/"}
"#;

    #[test]
    fn test_replay_trace() {
        let mut replay = Replay::new();
        let outcomes = replay.run(TRACE).unwrap();

        assert_eq!(outcomes.len(), 9);
        assert_eq!(
            outcomes[2],
            Outcome::Verdict { line: 5, channel_id: 42, action: Some("replace") }
        );
        assert_eq!(outcomes[3], Outcome::Unblocked { line: 6, handle: 900, value: true });
        assert_eq!(
            outcomes[4],
            Outcome::Verdict { line: 7, channel_id: 43, action: None }
        );
        assert_eq!(outcomes[6], Outcome::Unblocked { line: 9, handle: 900, value: false });
        assert_eq!(
            outcomes[8],
            Outcome::Verdict { line: 11, channel_id: 44, action: None }
        );

        assert_eq!(
            replay.stats(),
            &ReplayStats { ops: 9, blocks: 3, replaced: 1, allowed: 0, errors: 0 }
        );
        assert!(replay.engine().resolver().is_empty());
    }

    #[test]
    fn test_shutdown_and_restart() {
        let mut replay = Replay::new();
        let trace = r#"
{"op":"allow","id":"ext2","patterns":["*://cdn.example/*"],"hosts":["shop.example"]}
{"op":"shutdown"}
{"op":"block","channel_id":1,"url":"https://cdn.example/x","top_level_url":"https://shop.example/"}
{"op":"allow","id":"ext2","patterns":["*://cdn.example/*"],"hosts":["shop.example"]}
{"op":"block","channel_id":2,"url":"https://cdn.example/x","top_level_url":"https://shop.example/"}
"#;
        let outcomes = replay.run(trace).unwrap();
        assert_eq!(outcomes[2], Outcome::Verdict { line: 4, channel_id: 1, action: None });
        assert_eq!(
            outcomes[4],
            Outcome::Verdict { line: 6, channel_id: 2, action: Some("allow") }
        );
        assert!(replay.engine().manager().hub().is_listening(Topic::BeforeBlockChannel));
    }

    #[test]
    fn test_bad_pattern_is_reported_not_fatal() {
        let mut replay = Replay::new();
        let outcomes = replay
            .run(r#"{"op":"shim","id":"ext1","patterns":["nope"]}"#)
            .unwrap();
        assert!(matches!(outcomes[0], Outcome::Failed { line: 1, .. }));
        assert_eq!(replay.stats().errors, 1);
    }

    #[test]
    fn test_malformed_line_aborts() {
        let mut replay = Replay::new();
        let err = replay.run("{\"op\":\"explode\"}").unwrap_err();
        assert!(err.starts_with("Line 1:"));
    }

    #[test]
    fn test_outcome_rendering() {
        let verdict = Outcome::Verdict { line: 3, channel_id: 7, action: None };
        assert_eq!(verdict.to_string(), "   3: channel 7 -> blocked");
        let json = serde_json::to_string(&Outcome::Unblocked { line: 1, handle: 2, value: true }).unwrap();
        assert_eq!(json, r#"{"result":"unblocked","line":1,"handle":2,"value":true}"#);
    }
}
