//! Step reporting events
//!
//! The engine emits pass/fail/warn/info events keyed by a human-readable
//! step label. Reporting is purely observational: nothing listening (or
//! nothing at all) never affects engine behavior.

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

/// One reportable outcome of a step.
#[derive(Debug, Clone)]
pub enum StepEvent {
    Pass {
        step: String,
        message: String,
        at: DateTime<Local>,
    },
    Fail {
        step: String,
        message: String,
        at: DateTime<Local>,
    },
    Warn {
        step: String,
        message: String,
        at: DateTime<Local>,
    },
    Info {
        message: String,
        at: DateTime<Local>,
    },
}

/// Broadcast emitter for step events.
///
/// Cloneable; all clones feed the same channel. Emitting without any
/// subscriber is a no-op, not an error.
#[derive(Clone)]
pub struct Reporter {
    sender: broadcast::Sender<StepEvent>,
}

impl Reporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.sender.subscribe()
    }

    pub fn log_pass(&self, step: &str, message: impl Into<String>) {
        let _ = self.sender.send(StepEvent::Pass {
            step: step.to_string(),
            message: message.into(),
            at: Local::now(),
        });
    }

    pub fn log_fail(&self, step: &str, message: impl Into<String>) {
        let _ = self.sender.send(StepEvent::Fail {
            step: step.to_string(),
            message: message.into(),
            at: Local::now(),
        });
    }

    pub fn log_warn(&self, step: &str, message: impl Into<String>) {
        let _ = self.sender.send(StepEvent::Warn {
            step: step.to_string(),
            message: message.into(),
            at: Local::now(),
        });
    }

    pub fn log_info(&self, message: impl Into<String>) {
        let _ = self.sender.send(StepEvent::Info {
            message: message.into(),
            at: Local::now(),
        });
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Console listener printing events as they arrive.
pub struct ConsoleListener;

impl ConsoleListener {
    pub async fn listen(mut receiver: broadcast::Receiver<StepEvent>) {
        use colored::Colorize;

        while let Ok(event) = receiver.recv().await {
            match event {
                StepEvent::Pass { step, message, at } => {
                    println!(
                        "{} [{}] {}: {}",
                        "✓".green(),
                        at.format("%H:%M:%S"),
                        step.bold(),
                        message
                    );
                }
                StepEvent::Fail { step, message, at } => {
                    println!(
                        "{} [{}] {}: {}",
                        "✗".red(),
                        at.format("%H:%M:%S"),
                        step.bold(),
                        message
                    );
                }
                StepEvent::Warn { step, message, at } => {
                    println!(
                        "{} [{}] {}: {}",
                        "!".yellow(),
                        at.format("%H:%M:%S"),
                        step.bold(),
                        message
                    );
                }
                StepEvent::Info { message, at } => {
                    println!("  [{}] {}", at.format("%H:%M:%S"), message.dimmed());
                }
            }
        }
    }
}
