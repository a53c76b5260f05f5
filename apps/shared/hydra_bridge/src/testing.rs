//! Scripted command channel for unit tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channel::CommandChannel;
use crate::error::Result;
use crate::events::{HostEvent, Notifier, notification_queue};
use crate::session::Session;
use crate::value::ScriptValue;

struct Rule {
    needle: String,
    reply: ScriptValue,
    events: Vec<HostEvent>,
}

/// Answers expressions by substring match; the most recent rule wins.
/// Unmatched expressions evaluate to `null`.
pub(crate) struct ScriptedChannel {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<String>>,
    notifier: Mutex<Option<Notifier>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Arc<Self> {
        let channel = Arc::new(Self {
            rules: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            notifier: Mutex::new(None),
        });
        channel.on_with_events("hydra.loaded()", ScriptValue::Null, vec![HostEvent::Loaded]);
        channel
    }

    pub(crate) fn on(&self, needle: &str, reply: ScriptValue) {
        self.on_with_events(needle, reply, Vec::new());
    }

    pub(crate) fn on_with_events(&self, needle: &str, reply: ScriptValue, events: Vec<HostEvent>) {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            reply,
            events,
        });
    }

    pub(crate) fn set_notifier(&self, notifier: Notifier) {
        *self.notifier.lock().unwrap() = Some(notifier);
    }

    /// Every expression evaluated so far, oldest first
    pub(crate) fn expressions(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn evaluate(&self, expression: &str) -> Result<ScriptValue> {
        self.log.lock().unwrap().push(expression.to_string());

        let (reply, events) = {
            let rules = self.rules.lock().unwrap();
            match rules.iter().rev().find(|r| expression.contains(&r.needle)) {
                Some(rule) => (rule.reply.clone(), rule.events.clone()),
                None => (ScriptValue::Null, Vec::new()),
            }
        };

        if let Some(notifier) = self.notifier.lock().unwrap().as_ref() {
            for event in events {
                notifier.notify(event);
            }
        }
        Ok(reply)
    }
}

/// Session over `channel` that has already gone through the load sequence
pub(crate) async fn ready_session(channel: Arc<ScriptedChannel>) -> Session {
    let (notifier, stream) = notification_queue();
    channel.set_notifier(notifier);
    let session = Session::attach(channel, stream);
    session.navigate("").await.unwrap();
    session
}
