use std::collections::VecDeque;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use chatgate_rs::protocol::canonical::CompatibilityMode;
use chatgate_rs::protocol::ollama::NdjsonEncoder;
use chatgate_rs::protocol::openai_chat::ChatChunkEncoder;
use chatgate_rs::protocol::responses::ParsedEvent;
use chatgate_rs::stream::{Aggregate, ChunkEncoder, DataLineDecoder, StreamTranslator};

fn synthetic_body(deltas: usize) -> Vec<u8> {
    let mut events = vec![json!({"type": "response.created", "response": {"id": "resp_bench"}})];
    for idx in 0..deltas / 4 {
        events.push(json!({"type": "response.reasoning_summary_text.delta", "delta": format!("step {idx} ")}));
    }
    for idx in 0..deltas {
        events.push(json!({"type": "response.output_text.delta", "delta": format!("token{idx} ")}));
    }
    events.push(json!({"type": "response.output_item.done", "item": {
        "type": "function_call", "call_id": "call_1", "name": "lookup", "arguments": "{\"q\":\"rust\"}"
    }}));
    events.push(json!({"type": "response.completed", "response": {
        "id": "resp_bench", "usage": {"input_tokens": 40, "output_tokens": deltas}
    }}));

    let mut body = Vec::new();
    for event in events {
        body.extend_from_slice(format!("data: {event}\n\n").as_bytes());
    }
    body
}

fn split_lines(body: &[u8]) -> VecDeque<String> {
    let mut decoder = DataLineDecoder::new();
    let mut lines = VecDeque::new();
    for chunk in body.chunks(512) {
        decoder.feed_into(chunk, &mut lines);
    }
    decoder.finish_into(&mut lines);
    lines
}

fn translate_with<E: ChunkEncoder>(lines: &VecDeque<String>, mut encoder: E) -> usize {
    let mut translator = StreamTranslator::new(Some(CompatibilityMode::ThinkTags), false);
    let mut chunks = Vec::new();
    let mut frames: Vec<Bytes> = Vec::new();
    for data in lines {
        let _ = translator.on_event(ParsedEvent::from_data(data), &mut chunks);
        let response_id = translator.response_id();
        for chunk in chunks.drain(..) {
            encoder.encode(&chunk, response_id, &mut frames);
        }
    }
    translator.finish(&mut chunks);
    for chunk in chunks.drain(..) {
        encoder.encode(&chunk, None, &mut frames);
    }
    frames.iter().map(Bytes::len).sum()
}

fn bench_translate(c: &mut Criterion) {
    let body = synthetic_body(400);
    let lines = split_lines(&body);

    c.bench_function("sse_split_512b_chunks", |b| {
        b.iter(|| black_box(split_lines(black_box(&body))).len());
    });

    c.bench_function("translate_chat_chunks", |b| {
        b.iter(|| {
            black_box(translate_with(
                black_box(&lines),
                ChatChunkEncoder::new("gpt-5", 1_700_000_000, true),
            ))
        });
    });

    c.bench_function("translate_ollama_ndjson", |b| {
        b.iter(|| {
            black_box(translate_with(
                black_box(&lines),
                NdjsonEncoder::new("gpt-5", "2024-01-01T00:00:00Z"),
            ))
        });
    });

    c.bench_function("aggregate_non_stream", |b| {
        b.iter(|| {
            let mut agg = Aggregate::default();
            for data in black_box(&lines) {
                if !agg.apply(ParsedEvent::from_data(data)) {
                    break;
                }
            }
            black_box(agg.text.len())
        });
    });
}

criterion_group!(benches, bench_translate);
criterion_main!(benches);
