//! Message-to-command dispatch
//!
//! Every inbound text payload is substituted into each of the session's
//! command templates and the results are handed to the [`CommandSink`] in
//! declared order.
//!
//! # Unsanitized substitution
//!
//! The payload is inserted verbatim: no escaping, no length limit, no
//! filtering. A peer that can send messages can therefore inject command
//! separators or anything else the host's command parser understands.
//! Operators must only point endpoints at peers they trust with the
//! host's command surface.

use crate::traits::CommandSink;
use std::sync::Arc;
use tracing::debug;

/// Placeholder replaced by the inbound message
pub const MESSAGE_TOKEN: &str = "%message%";

/// Replace every occurrence of [`MESSAGE_TOKEN`] in `template` with `raw`
#[inline]
pub fn render(template: &str, raw: &str) -> String {
    template.replace(MESSAGE_TOKEN, raw)
}

/// Turns inbound payloads into command invocations
///
/// Must only be called from the cooperative scheduler context; the
/// downstream sink assumes a single writer.
#[derive(Clone)]
pub struct CommandDispatcher {
    sink: Arc<dyn CommandSink>,
}

impl CommandDispatcher {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }

    /// Render and dispatch every template, sequentially and in order
    ///
    /// Returns the number of commands handed to the sink.
    pub fn execute(&self, templates: &[String], raw: &str) -> usize {
        for template in templates {
            let command = render(template, raw);
            debug!("Dispatching command: {}", command);
            self.sink.dispatch(&command);
        }
        templates.len()
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}
