//! Progress aggregation for a single download.
//!
//! The transfer engine streams JSON [`ProgressEvent`]s into a
//! [`ProgressAggregator`] from any number of worker threads, cut at arbitrary
//! byte boundaries. The aggregator reassembles the events, keeps per-file and
//! total byte counters, and publishes derived values to its
//! [`ProgressTarget`]:
//! - overall progress (monotonic, in [0, 1])
//! - a `Speed: <size>/s | ETA: <duration>` line, smoothed over a sample window
//! - a short summary of the files currently in flight
//!
//! A single mutex guards the reassembly buffer and every counter.

mod event;


pub use event::{ProgressEvent, ProgressSink, ProgressTarget};

use crate::config::ProgressConfig;
use crate::utils::{format_bytes, format_duration, truncate_middle};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Minimum time between two throughput samples
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Counters shared by all writers of one download
struct AggregatorState {
    /// Undecoded tail of the byte stream
    buffer: Vec<u8>,
    overall_total_bytes: u64,
    downloaded_bytes: u64,
    /// Highest `current_bytes` seen per file
    last_seen: HashMap<String, u64>,
    /// Unfinished files: name -> (current, total)
    in_flight: BTreeMap<String, (u64, u64)>,
    downloading: bool,
    published_progress: f64,
    published_file_status: String,
    speed_samples: VecDeque<f64>,
    last_sample_at: Instant,
    last_sample_bytes: u64,
}

/// Point-in-time copy of the aggregator's counters
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Announced size of the whole download
    pub overall_total_bytes: u64,
    /// Bytes counted so far
    pub downloaded_bytes: u64,
    /// Mean of the current speed window, bytes per second
    pub average_speed: f64,
    /// Number of unfinished files
    pub files_in_flight: usize,
}

/// Decodes a chunked progress stream and publishes derived values
pub struct ProgressAggregator {
    target: Arc<dyn ProgressTarget>,
    settings: ProgressConfig,
    state: Mutex<AggregatorState>,
}

impl ProgressAggregator {
    /// Create an aggregator publishing into `target`
    pub fn new(target: Arc<dyn ProgressTarget>, settings: ProgressConfig) -> Self {
        Self {
            target,
            settings,
            state: Mutex::new(AggregatorState {
                buffer: Vec::new(),
                overall_total_bytes: 0,
                downloaded_bytes: 0,
                last_seen: HashMap::new(),
                in_flight: BTreeMap::new(),
                downloading: false,
                published_progress: 0.0,
                published_file_status: String::new(),
                speed_samples: VecDeque::new(),
                last_sample_at: Instant::now(),
                last_sample_bytes: 0,
            }),
        }
    }

    /// Feed the next chunk of the byte stream
    pub fn ingest(&self, chunk: &[u8]) {
        self.ingest_at(chunk, Instant::now());
    }

    /// Feed a chunk with an explicit clock reading
    pub(crate) fn ingest_at(&self, chunk: &[u8], now: Instant) {
        let mut state = self.lock();
        state.buffer.extend_from_slice(chunk);

        let buffer = std::mem::take(&mut state.buffer);
        let (values, consumed) = decode_available(&buffer);
        state.buffer = buffer[consumed..].to_vec();

        let mut saw_file_progress = false;
        for value in values {
            match serde_json::from_value::<ProgressEvent>(value) {
                Ok(ProgressEvent::Start {
                    overall_total_bytes,
                }) => {
                    state.overall_total_bytes = overall_total_bytes;
                    state.last_sample_at = now;
                    state.last_sample_bytes = state.downloaded_bytes;
                }
                Ok(ProgressEvent::FileProgress {
                    file_name,
                    current_bytes,
                    total_bytes,
                }) => {
                    self.apply_file_progress(&mut state, file_name, current_bytes, total_bytes, now);
                    saw_file_progress = true;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unrecognized progress event");
                }
            }
        }

        if saw_file_progress {
            let status = self.render_file_status(&state);
            if status != state.published_file_status {
                state.published_file_status = status.clone();
                self.target.publish_file_status(status);
            }
        }
    }

    /// Current counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            overall_total_bytes: state.overall_total_bytes,
            downloaded_bytes: state.downloaded_bytes,
            average_speed: average(&state.speed_samples),
            files_in_flight: state.in_flight.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        // A panicking writer leaves counters consistent enough to keep reporting
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_file_progress(
        &self,
        state: &mut AggregatorState,
        file_name: String,
        current_bytes: u64,
        total_bytes: u64,
        now: Instant,
    ) {
        let last = state.last_seen.get(&file_name).copied().unwrap_or(0);
        let stale = current_bytes < last;
        if current_bytes > last {
            state.downloaded_bytes += current_bytes - last;
            state.last_seen.insert(file_name.clone(), current_bytes);
        }

        if !state.downloading {
            state.downloading = true;
            self.target.begin_downloading();
        }

        if !stale {
            if total_bytes > 0 && current_bytes >= total_bytes {
                state.in_flight.remove(&file_name);
            } else {
                state.in_flight.insert(file_name, (current_bytes, total_bytes));
            }
        }

        if state.overall_total_bytes > 0 {
            let progress =
                (state.downloaded_bytes as f64 / state.overall_total_bytes as f64).clamp(0.0, 1.0);
            if progress > state.published_progress {
                state.published_progress = progress;
                self.target.publish_progress(progress);
            }
        }

        let elapsed = now.saturating_duration_since(state.last_sample_at);
        if elapsed >= SAMPLE_INTERVAL {
            let bytes = state.downloaded_bytes.saturating_sub(state.last_sample_bytes);
            state.speed_samples.push_back(bytes as f64 / elapsed.as_secs_f64());
            while state.speed_samples.len() > self.settings.speed_window {
                state.speed_samples.pop_front();
            }
            state.last_sample_at = now;
            state.last_sample_bytes = state.downloaded_bytes;

            let details = render_details(
                average(&state.speed_samples),
                state.overall_total_bytes,
                state.downloaded_bytes,
            );
            self.target.publish_details(details);
        }
    }

    fn render_file_status(&self, state: &AggregatorState) -> String {
        let mut lines: Vec<String> = state
            .in_flight
            .iter()
            .take(self.settings.max_file_lines)
            .map(|(name, &(current, total))| {
                let percent = if total > 0 {
                    current as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                format!(
                    "{}: {}/{} ({:.1}%)",
                    truncate_middle(name, self.settings.max_file_name_len),
                    format_bytes(current),
                    format_bytes(total),
                    percent
                )
            })
            .collect();

        if state.in_flight.len() > self.settings.max_file_lines {
            lines.push(format!(
                "...and {} more files",
                state.in_flight.len() - self.settings.max_file_lines
            ));
        }

        lines.join("\n")
    }
}

impl ProgressSink for ProgressAggregator {
    fn write_progress(&self, chunk: &[u8]) {
        self.ingest(chunk);
    }
}

impl std::io::Write for &ProgressAggregator {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.ingest(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Decode every complete JSON value at the front of `buffer`
///
/// Returns the values and how many bytes they used. An incomplete trailing
/// value is left for the next call. A malformed value costs only its own
/// line: decoding resumes after the next newline.
fn decode_available(buffer: &[u8]) -> (Vec<serde_json::Value>, usize) {
    let mut values = Vec::new();
    let mut offset = 0;

    'lines: loop {
        let mut stream =
            serde_json::Deserializer::from_slice(&buffer[offset..]).into_iter::<serde_json::Value>();
        loop {
            match stream.next() {
                Some(Ok(value)) => values.push(value),
                Some(Err(e)) if e.is_eof() => return (values, offset + stream.byte_offset()),
                Some(Err(e)) => {
                    let bad = offset + stream.byte_offset();
                    let line_start = bad
                        + buffer[bad..]
                            .iter()
                            .take_while(|b| b.is_ascii_whitespace())
                            .count();
                    match buffer[line_start..].iter().position(|&b| b == b'\n') {
                        Some(len) => {
                            tracing::warn!(
                                error = %e,
                                discarded_bytes = len + 1,
                                "malformed progress line, skipping it"
                            );
                            offset = line_start + len + 1;
                            continue 'lines;
                        }
                        None => {
                            tracing::warn!(
                                error = %e,
                                discarded_bytes = buffer.len() - line_start,
                                "malformed progress data, discarding buffered bytes"
                            );
                            return (values, buffer.len());
                        }
                    }
                }
                None => return (values, buffer.len()),
            }
        }
    }
}

fn average(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

fn render_details(average_speed: f64, overall_total_bytes: u64, downloaded_bytes: u64) -> String {
    let speed = format!("Speed: {}/s", format_bytes(average_speed as u64));
    let remaining = overall_total_bytes.saturating_sub(downloaded_bytes);
    if average_speed > 0.0 && remaining > 0 {
        let eta_secs = (remaining as f64 / average_speed).round() as u64;
        format!("{} | ETA: {}", speed, format_duration(eta_secs))
    } else {
        speed
    }
}
