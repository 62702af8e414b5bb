use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::IngestError;

const DEFAULT_PROBE_ARGS: &[&str] = &["-v", "error", "-print_format", "json", "-show_streams"];

/// One stream descriptor as reported by the probing tool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl ProbeStream {
    pub fn is_visual(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }
}

/// Parsed structural description of a media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub streams: Vec<ProbeStream>,
}

impl ProbeResult {
    /// Pixel dimensions of the first visual stream, if any
    pub fn first_visual_dimensions(&self) -> (Option<u32>, Option<u32>) {
        self.streams
            .iter()
            .find(|s| s.is_visual())
            .map(|s| (s.width, s.height))
            .unwrap_or((None, None))
    }
}

#[derive(Deserialize)]
struct RawProbeOutput {
    streams: Option<Vec<ProbeStream>>,
}

/// Parse the tool's JSON output. Absent or empty stream lists are errors.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult, IngestError> {
    let raw: RawProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| IngestError::ProbeParse(format!("invalid JSON: {}", e)))?;

    let streams = raw
        .streams
        .ok_or_else(|| IngestError::ProbeParse("output has no 'streams' field".to_string()))?;

    if streams.is_empty() {
        return Err(IngestError::ProbeParse(
            "output lists no streams".to_string(),
        ));
    }

    Ok(ProbeResult { streams })
}

/// Structural analysis of a spooled file
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, location: &Path) -> Result<ProbeResult, IngestError>;
}

/// Runs `ffprobe` (or a compatible tool) as a subprocess.
///
/// The child is killed if the probe future is dropped, so a cancelled request
/// does not leave the tool running.
pub struct FfprobeProber {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: DEFAULT_PROBE_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout,
        }
    }

    /// Replace the arguments placed before the file path
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, location: &Path) -> Result<ProbeResult, IngestError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(location)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IngestError::ProbeProcess(format!("failed to start {}: {}", self.program, e))
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(|e| {
                IngestError::ProbeProcess(format!("{} did not complete: {}", self.program, e))
            })?,
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {:?} on {}",
                    self.program,
                    self.timeout,
                    location.display()
                );
                return Err(IngestError::ProbeProcess(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("{} failed: {}", self.program, stderr.trim());
            return Err(IngestError::ProbeProcess(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_probe_output(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "aac", "codec_type": "audio", "sample_rate": "48000"},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080}
        ]
    }"#;

    #[test]
    fn test_parse_picks_first_visual_stream() {
        let result = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert_eq!(result.streams.len(), 2);
        assert_eq!(result.streams[0].codec_type.as_deref(), Some("audio"));
        assert_eq!(result.first_visual_dimensions(), (Some(1920), Some(1080)));
    }

    #[test]
    fn test_parse_audio_only_has_no_dimensions() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        let result = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!(result.first_visual_dimensions(), (None, None));
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        assert!(matches!(
            parse_probe_output(b"not json at all"),
            Err(IngestError::ProbeParse(_))
        ));
        assert!(matches!(
            parse_probe_output(b"{}"),
            Err(IngestError::ProbeParse(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams": []}"#),
            Err(IngestError::ProbeParse(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams": [{"width": "wide"}]}"#),
            Err(IngestError::ProbeParse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_tool_is_process_error() {
        let prober = FfprobeProber::new("definitely-not-a-probe-tool", Duration::from_secs(5));
        let err = prober.probe(Path::new("/tmp/nothing")).await.unwrap_err();
        assert!(matches!(err, IngestError::ProbeProcess(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_process_error() {
        let prober = FfprobeProber::new("false", Duration::from_secs(5));
        let err = prober.probe(Path::new("/tmp/nothing")).await.unwrap_err();
        assert!(matches!(err, IngestError::ProbeProcess(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_json_stdout_is_parse_error() {
        let prober = FfprobeProber::new("echo", Duration::from_secs(5));
        let err = prober.probe(Path::new("/tmp/nothing")).await.unwrap_err();
        assert!(matches!(err, IngestError::ProbeParse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hanging_tool_times_out() {
        let prober = FfprobeProber::new("sh", Duration::from_millis(200))
            .with_args(["-c", "sleep 10"]);
        let started = std::time::Instant::now();
        let err = prober.probe(Path::new("/tmp/nothing")).await.unwrap_err();
        assert!(matches!(err, IngestError::ProbeProcess(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_output_is_parsed() {
        let prober = FfprobeProber::new("sh", Duration::from_secs(5)).with_args([
            "-c",
            r#"echo '{"streams":[{"codec_type":"video","width":1080,"height":1920}]}'"#,
        ]);
        let result = prober.probe(Path::new("/tmp/nothing")).await.unwrap();
        assert_eq!(result.first_visual_dimensions(), (Some(1080), Some(1920)));
    }
}
