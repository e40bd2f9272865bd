use std::convert::Infallible;

use bytes::Bytes;
use futures_util::Stream;

use crate::error::GatewayError;
use crate::observability::RequestLog;
use crate::protocol::canonical::CompatibilityMode;
use crate::state::AppState;
use crate::stream::{
    aggregate, translate_stream, Aggregate, ChunkEncoder, StreamTranslator, UpstreamLines,
};
use crate::transport::UpstreamEnvelope;

fn lines(state: &AppState, envelope: UpstreamEnvelope) -> UpstreamLines {
    UpstreamLines::new(envelope.body, state.config.features.verbose)
}

/// Client byte stream for a streaming response. `exposure` is how reasoning
/// text reaches this client, `None` to hide it.
pub(crate) fn stream_body<E>(
    state: &AppState,
    envelope: UpstreamEnvelope,
    exposure: Option<CompatibilityMode>,
    encoder: E,
    model: &str,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    E: ChunkEncoder + 'static,
{
    let verbose = state.config.features.verbose;
    translate_stream(
        lines(state, envelope),
        StreamTranslator::new(exposure, verbose),
        encoder,
        RequestLog::start(model),
    )
}

/// Drain the envelope into one [`Aggregate`].
///
/// # Errors
///
/// Returns [`GatewayError::UpstreamFailedMidStream`] when the upstream
/// reported a failure event.
pub(crate) async fn collect(
    state: &AppState,
    envelope: UpstreamEnvelope,
    model: &str,
) -> Result<Aggregate, GatewayError> {
    let log = RequestLog::start(model);
    let mut agg = aggregate(lines(state, envelope)).await;
    if let Some(message) = agg.failure.take() {
        tracing::warn!(model, message = %message, "upstream reported failure");
        return Err(GatewayError::UpstreamFailedMidStream(message));
    }
    log.finish(agg.usage.as_ref());
    Ok(agg)
}
