pub mod aggregate;
pub mod sse;
pub mod translator;

pub use aggregate::{aggregate, Aggregate, AggregatedToolCall};
pub use sse::{ndjson_line, sse_data_frame, DataLineDecoder, UpstreamLines, DONE_FRAME};
pub use translator::{Flow, StreamChunk, StreamState, StreamTranslator, ToolCallChunk};

use std::collections::VecDeque;
use std::convert::Infallible;

use bytes::Bytes;
use futures_util::Stream;

use crate::observability::RequestLog;
use crate::protocol::responses::ParsedEvent;

/// Client-protocol framing of [`StreamChunk`]s.
pub trait ChunkEncoder: Send {
    /// Append the wire frames for `chunk`. `response_id` is the latest
    /// upstream response id, if one was seen.
    fn encode(&mut self, chunk: &StreamChunk, response_id: Option<&str>, out: &mut Vec<Bytes>);
}

struct Pump<E> {
    lines: Option<UpstreamLines>,
    translator: StreamTranslator,
    encoder: E,
    chunks: Vec<StreamChunk>,
    frames: Vec<Bytes>,
    pending: VecDeque<Bytes>,
    log: RequestLog,
}

impl<E: ChunkEncoder> Pump<E> {
    fn flush(&mut self) {
        let response_id = self.translator.response_id();
        for chunk in self.chunks.drain(..) {
            self.encoder.encode(&chunk, response_id, &mut self.frames);
        }
        self.pending.extend(self.frames.drain(..));
    }

    fn close(&mut self) {
        // Dropping the reader closes the upstream connection.
        self.lines = None;
        self.log.finish(self.translator.usage());
    }
}

/// Drive `translator` over the upstream body and encode every chunk with
/// `encoder`, lazily, as the client pulls.
pub fn translate_stream<E>(
    lines: UpstreamLines,
    translator: StreamTranslator,
    encoder: E,
    log: RequestLog,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    E: ChunkEncoder + 'static,
{
    let pump = Pump {
        lines: Some(lines),
        translator,
        encoder,
        chunks: Vec::with_capacity(4),
        frames: Vec::with_capacity(4),
        pending: VecDeque::with_capacity(4),
        log,
    };

    futures_util::stream::unfold(pump, |mut pump| async move {
        loop {
            if let Some(frame) = pump.pending.pop_front() {
                return Some((Ok(frame), pump));
            }
            let lines = pump.lines.as_mut()?;
            match lines.next_data().await {
                Some(Ok(data)) => {
                    let parsed = ParsedEvent::from_data(&data);
                    if pump.translator.on_event(parsed, &mut pump.chunks) == Flow::Stop {
                        pump.close();
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "upstream stream broke mid-response");
                    pump.translator.finish(&mut pump.chunks);
                    pump.close();
                }
                None => {
                    pump.translator.finish(&mut pump.chunks);
                    pump.close();
                }
            }
            pump.flush();
        }
    })
}
