//! Incremental decoding of newline-delimited generation output.
//!
//! The upstream body is a sequence of independently decodable JSON lines terminated by an in-band
//! `done` flag, not by end of stream. [`chunk_stream`] turns the transport byte stream into a lazy
//! stream of [`GenerationChunk`]s and [`aggregate`] pulls from it until the terminal chunk.

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::fmt::Display;
use std::pin::pin;

use super::SummaryError;

/// Longest line accepted before the newline arrives.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One decoded line of the generation stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationChunk {
    /// Incremental text fragment.
    #[serde(rename = "response")]
    pub text: String,
    /// Set on the terminal chunk.
    pub done: bool,
}

/// Split a byte stream on `\n` and decode each line as it completes.
///
/// Lines may span any number of transport chunks. Whitespace-only lines are skipped and a final
/// line without a trailing newline is still decoded; if that final fragment does not decode, the
/// body was cut off mid-line and the stream ends with [`SummaryError::IncompleteStream`], as it
/// does on a transport error. A line growing past [`MAX_LINE_BYTES`] without a newline fails with
/// [`SummaryError::LineTooLong`]. Nothing is read past what the consumer polls for.
pub fn chunk_stream<S, B, E>(body: S) -> impl Stream<Item = Result<GenerationChunk, SummaryError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    try_stream! {
        let mut body = pin!(body);
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes of `buffer` already known to hold no newline.
        let mut scanned = 0_usize;

        while let Some(next) = body.next().await {
            let bytes = next.map_err(|error| {
                SummaryError::IncompleteStream(format!("stream interrupted: {error}"))
            })?;
            buffer.extend_from_slice(bytes.as_ref());

            while let Some(offset) = buffer[scanned..].iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=scanned + offset).collect();
                scanned = 0;
                if let Some(chunk) = decode_line(&line)? {
                    yield chunk;
                }
            }
            scanned = buffer.len();

            if buffer.len() > MAX_LINE_BYTES {
                Err(SummaryError::LineTooLong { limit: MAX_LINE_BYTES })?;
            }
        }

        match decode_line(&buffer) {
            Ok(Some(chunk)) => {
                yield chunk;
            }
            Ok(None) => {}
            Err(SummaryError::StreamDecode { line, .. }) => {
                Err(SummaryError::IncompleteStream(format!(
                    "stream ended mid-line: {line}"
                )))?;
            }
            Err(error) => Err(error)?,
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<GenerationChunk>, SummaryError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|source| SummaryError::StreamDecode {
            line: String::from_utf8_lossy(line).into_owned(),
            source,
        })
}

/// Concatenate chunk text until a chunk with `done == true` arrives.
///
/// The stream is dropped as soon as the terminal chunk is seen. Any error, or running out of
/// chunks first, discards the text accumulated so far.
pub async fn aggregate<S>(chunks: S) -> Result<String, SummaryError>
where
    S: Stream<Item = Result<GenerationChunk, SummaryError>>,
{
    let mut chunks = pin!(chunks);
    let mut summary = String::new();
    let mut received = 0_usize;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        received += 1;
        summary.push_str(&chunk.text);
        if chunk.done {
            tracing::trace!(chunks = received, length = summary.len(), "Generation complete");
            return Ok(summary);
        }
    }

    Err(SummaryError::IncompleteStream(format!(
        "stream ended after {received} chunk(s) without a terminal chunk"
    )))
}
