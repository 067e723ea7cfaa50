//! Bindings for the generative sequence model used by Plan B.

use std::path::Path;
use std::time::Duration;

use melody_gen::{ModelError, ModelSegment, SequenceModel};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct SampleRequest {
    num_segments: usize,
    steps_per_segment: usize,
}

/// Wire shape shared by the HTTP service and fixture files.
#[derive(Debug, Deserialize)]
struct SampleResponse {
    segments: Vec<ModelSegment>,
}

/// Talks to a model server over blocking HTTP. One POST per `sample` call,
/// no retries.
pub struct HttpSequenceModel {
    client: Client,
    url: String,
}

impl HttpSequenceModel {
    pub fn new(url: impl Into<String>) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

impl SequenceModel for HttpSequenceModel {
    fn sample(&self, num_segments: usize, steps_per_segment: usize) -> Result<Vec<ModelSegment>, ModelError> {
        debug!(url = %self.url, num_segments, steps_per_segment, "requesting model segments");
        let resp = self
            .client
            .post(&self.url)
            .json(&SampleRequest { num_segments, steps_per_segment })
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::Request(e.to_string()))?;
        let body: SampleResponse = resp.json().map_err(|e| ModelError::Malformed(e.to_string()))?;
        Ok(body.segments)
    }
}

/// Replays segments recorded in a JSON file. Requests for more segments
/// than the file holds cycle through it again.
#[derive(Clone, Debug)]
pub struct FixtureModel {
    segments: Vec<ModelSegment>,
}

impl FixtureModel {
    pub fn new(segments: Vec<ModelSegment>) -> Self {
        Self { segments }
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let body: SampleResponse =
            serde_json::from_str(text).map_err(|e| ModelError::Malformed(e.to_string()))?;
        Ok(Self::new(body.segments))
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Request(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

impl SequenceModel for FixtureModel {
    fn sample(&self, num_segments: usize, _steps_per_segment: usize) -> Result<Vec<ModelSegment>, ModelError> {
        if self.segments.is_empty() {
            return Err(ModelError::Malformed("fixture holds no segments".into()));
        }
        Ok(self.segments.iter().cycle().take(num_segments).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "segments": [
            { "notes": [ { "pitch": 60, "velocity": 90, "start": 0.0, "end": 1.0 } ] },
            { "notes": [ { "pitch": 64, "velocity": 90, "start": 0.5, "end": 2.0 },
                         { "pitch": 67, "velocity": 70, "start": 2.0, "end": 4.0 } ] }
        ]
    }"#;

    #[test]
    fn fixture_cycles_and_truncates() {
        let m = FixtureModel::from_json(FIXTURE).unwrap();
        let one = m.sample(1, 16).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].notes[0].pitch, 60);

        let five = m.sample(5, 16).unwrap();
        assert_eq!(five.len(), 5);
        assert_eq!(five[3].notes.len(), 2);
        assert_eq!(five[4].notes[0].pitch, 60);
    }

    #[test]
    fn fixture_loads_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(FIXTURE.as_bytes()).unwrap();
        let m = FixtureModel::load(f.path()).unwrap();
        assert_eq!(m.sample(2, 16).unwrap()[1].notes[1].end, 4.0);
    }

    #[test]
    fn empty_or_broken_fixtures_are_errors() {
        let empty = FixtureModel::from_json(r#"{ "segments": [] }"#).unwrap();
        assert!(matches!(empty.sample(1, 16), Err(ModelError::Malformed(_))));
        assert!(matches!(FixtureModel::from_json("[]"), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn unreachable_server_is_a_request_error() {
        let m = HttpSequenceModel::new("http://127.0.0.1:9/sample").unwrap();
        assert!(matches!(m.sample(1, 16), Err(ModelError::Request(_))));
    }
}
