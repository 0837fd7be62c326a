//! Progress wire events and the seams around the aggregator

use serde::{Deserialize, Serialize};

/// A unit of transfer progress, written by the transfer engine as JSON
///
/// ```json
/// {"type":"start","overall_total_bytes":1048576}
/// {"type":"file_progress","file_name":"setup.exe","current_bytes":4096,"total_bytes":65536}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Transfer is about to begin; announces the size of everything to fetch
    Start {
        /// Sum of all file sizes in bytes
        overall_total_bytes: u64,
    },
    /// Bytes received so far for one file
    FileProgress {
        /// File being fetched
        file_name: String,
        /// Bytes on disk for this file, including resumed bytes
        current_bytes: u64,
        /// Final size of the file (0 if unknown)
        total_bytes: u64,
    },
}

impl ProgressEvent {
    /// Encode as one newline-terminated JSON line
    pub fn to_line(&self) -> Vec<u8> {
        // Serializing a plain enum of strings and integers cannot fail
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }
}

/// Where the transfer engine writes its raw progress bytes
///
/// Chunks may split events at any byte and may arrive from several
/// worker threads at once.
pub trait ProgressSink: Send + Sync {
    /// Accept the next chunk of encoded progress events
    fn write_progress(&self, chunk: &[u8]);
}

/// Receiver of the aggregator's derived values, normally a download task
pub trait ProgressTarget: Send + Sync {
    /// First file progress arrived
    fn begin_downloading(&self);
    /// Overall progress in [0, 1]; never decreasing
    fn publish_progress(&self, progress: f64);
    /// Speed/ETA line
    fn publish_details(&self, details: String);
    /// Multi-line file summary
    fn publish_file_status(&self, text: String);
}
