//! Approval Gates
//!
//! Tools whose contract sets `requires_approval` are only invoked after an
//! [`ApprovalGate`] grants the call. The tracer's default gate is
//! [`DenyAll`], so a host that forgets to configure approval never runs a
//! guarded tool by accident.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use log::{info, warn};

use crate::tool::Arguments;

/// Human-in-the-loop or policy check consulted before guarded calls.
///
/// Implementations block until a decision is available.
pub trait ApprovalGate: Send + Sync {
    fn request_approval(&self, tool_name: &str, args: &Arguments) -> bool;
}

impl<F> ApprovalGate for F
where
    F: Fn(&str, &Arguments) -> bool + Send + Sync,
{
    fn request_approval(&self, tool_name: &str, args: &Arguments) -> bool {
        self(tool_name, args)
    }
}

/// Refuses every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl ApprovalGate for DenyAll {
    fn request_approval(&self, tool_name: &str, _args: &Arguments) -> bool {
        warn!("No approval gate configured - denying '{}'", tool_name);
        false
    }
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn request_approval(&self, tool_name: &str, _args: &Arguments) -> bool {
        info!("Auto-approving '{}'", tool_name);
        true
    }
}

/// Asks an operator on an interactive stream, `y`/`yes` to approve.
///
/// Reads from stdin and writes to stderr by default; any reader and writer
/// can be supplied instead.
pub struct ConsoleApproval<R, W> {
    io: Mutex<(R, W)>,
}

impl ConsoleApproval<io::BufReader<io::Stdin>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConsoleApproval<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl<R, W> ApprovalGate for ConsoleApproval<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn request_approval(&self, tool_name: &str, args: &Arguments) -> bool {
        let Ok(mut io) = self.io.lock() else {
            warn!("Approval console unavailable - denying '{}'", tool_name);
            return false;
        };
        let (reader, writer) = &mut *io;

        let rendered = serde_json::to_string(args).unwrap_or_default();
        if write!(writer, "Approve '{}' with {}? [y/N] ", tool_name, rendered)
            .and_then(|_| writer.flush())
            .is_err()
        {
            return false;
        }

        let mut answer = String::new();
        if reader.read_line(&mut answer).is_err() {
            return false;
        }

        let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
        info!(
            "Operator {} '{}'",
            if approved { "approved" } else { "denied" },
            tool_name
        );
        approved
    }
}
