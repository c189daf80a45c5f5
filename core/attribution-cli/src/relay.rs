//! Frame message relay over stdio.
//!
//! Each stdin line is one delivered message: `{"origin": "...", "data": ...}`.
//! Every post back to the frame is written to stdout as
//! `{"target_origin": "...", "message": ...}`. Lines that are not valid
//! messages are skipped with a warning; the relay keeps going.

use std::io::{self, BufRead, Write};

use attribution_core::{
    AttributionError, Disposition, EventQueue, FramePort, InboundMessage, Result,
};
use embed_attribution_protocol::ParentMessage;
use serde_json::json;
use tracing::{info, warn};

use crate::page::{open_tracker, PageArgs, StorageArgs};

struct StdoutPort<W: Write> {
    out: W,
    failed: Option<io::Error>,
}

impl<W: Write> FramePort for StdoutPort<W> {
    fn post_message(&mut self, message: &ParentMessage, target_origin: &str) {
        if self.failed.is_some() {
            return;
        }
        let line = json!({ "target_origin": target_origin, "message": message });
        if let Err(err) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            self.failed = Some(err);
        }
    }
}

pub fn run(
    page: &PageArgs,
    storage: &StorageArgs,
    embeds: &[String],
    dump_data_layer: bool,
) -> Result<()> {
    let mut tracker = open_tracker(page, storage)?;
    let rewritten = tracker.init(embeds);
    for url in &rewritten {
        info!(embed = %url, "Embed URL");
    }

    let stdout = io::stdout();
    let mut port = StdoutPort {
        out: stdout.lock(),
        failed: None,
    };

    let mut handled = 0usize;
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line.map_err(|source| io_error("read stdin", source))?;
        if line.trim().is_empty() {
            continue;
        }
        let message: InboundMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!(line = index + 1, error = %err, "Skipping malformed message line");
                continue;
            }
        };

        let outcome = tracker.handle_message(&message, &mut port);
        if let Some(err) = port.failed.take() {
            return Err(io_error("write stdout", err));
        }
        if !matches!(outcome, Disposition::Dropped(_)) {
            handled += 1;
        }
    }

    info!(
        handled,
        queued = tracker.data_layer().len(),
        "Relay finished"
    );

    if dump_data_layer {
        let line = json!({ "data_layer": tracker.data_layer().entries() });
        writeln!(port.out, "{}", line).map_err(|source| io_error("write stdout", source))?;
    }
    Ok(())
}

fn io_error(context: &str, source: io::Error) -> AttributionError {
    AttributionError::Io {
        context: context.to_string(),
        source,
    }
}
