//! Execution Timeline
//!
//! Records when each plan step starts and finishes, and in which scheduling
//! round, for run reports and Gantt charts.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step was dispatched
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
}

/// A single entry in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub step_id: String,
    /// Scheduling round, starting at 1
    pub round: usize,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Start and end of one step relative to the timeline start.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpan {
    pub step_id: String,
    pub round: usize,
    pub start: Duration,
    pub end: Option<Duration>,
    pub failed: bool,
}

impl StepSpan {
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

/// Tracks the execution timeline of a plan run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step_id: impl Into<String>, round: usize, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_id: step_id.into(),
            round,
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Step ids grouped by the round they started in, in dispatch order.
    pub fn rounds(&self) -> Vec<Vec<String>> {
        let mut rounds: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for event in &self.events {
            if event.event_type == EventType::Started {
                rounds.entry(event.round).or_default().push(event.step_id.clone());
            }
        }
        rounds.into_values().collect()
    }

    /// One span per started step, ordered by start time.
    pub fn spans(&self) -> Vec<StepSpan> {
        let mut spans: Vec<StepSpan> = Vec::new();
        let mut open: HashMap<&str, usize> = HashMap::new();

        for event in &self.events {
            let at = event.timestamp.duration_since(self.start_time);
            match event.event_type {
                EventType::Started => {
                    open.insert(event.step_id.as_str(), spans.len());
                    spans.push(StepSpan {
                        step_id: event.step_id.clone(),
                        round: event.round,
                        start: at,
                        end: None,
                        failed: false,
                    });
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(&pos) = open.get(event.step_id.as_str()) {
                        spans[pos].end = Some(at);
                        spans[pos].failed = event.event_type == EventType::Failed;
                    }
                }
            }
        }

        spans
    }

    /// Step durations in milliseconds, for finished steps only.
    pub fn get_durations(&self) -> HashMap<String, u128> {
        self.spans()
            .into_iter()
            .filter_map(|span| span.duration().map(|d| (span.step_id, d.as_millis())))
            .collect()
    }

    /// Generates an ASCII Gantt chart.
    ///
    /// Completed steps are drawn with `#`, failed steps with `x`.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let spans = self.spans();
        let total = spans
            .iter()
            .filter_map(|s| s.end)
            .max()
            .unwrap_or_default()
            .as_millis()
            .max(1);

        // Scale to 50 characters width
        let scale = 50.0 / total as f64;

        for span in &spans {
            let Some(duration) = span.duration() else {
                continue;
            };
            let start_ms = span.start.as_millis();
            let start_pos = (start_ms as f64 * scale) as usize;
            let width = (duration.as_millis() as f64 * scale).max(1.0) as usize;
            let mark = if span.failed { "x" } else { "#" };

            output.push_str(&format!(
                "{} r{:<2} |{}{}| ({} ms)\n",
                truncate(&span.step_id, 12),
                span.round,
                " ".repeat(start_pos),
                mark.repeat(width),
                duration.as_millis()
            ));
        }

        output.push_str(&format!(
            "\nRounds: {}  Total: {} ms\n",
            self.rounds().len(),
            self.elapsed().as_millis()
        ));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
