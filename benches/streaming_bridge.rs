//! Benchmarks for the streaming bridge
//!
//! This benchmark measures:
//! - SSE `data:` payload extraction
//! - Bridge throughput for text and tool-call streams
//! - The full bytes → NDJSON path

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::StreamExt;
use ollama_openai_gateway::mapping::ModelMapping;
use ollama_openai_gateway::pipeline::{bridge_stream, ndjson_body, SseDecoder, StreamBridge};
use ollama_openai_gateway::translate::{ChatTranslator, DynChatTranslator, TranslatorSettings};
use ollama_openai_gateway::types::{ChatMessage, ChatRequest, InboundRequest};
use std::sync::Arc;

/// Sample SSE frames (OpenAI format)
const SSE_FRAMES: &[&str] = &[
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":" there"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
    "data: [DONE]",
];

/// Sample SSE frames with tool calls
const SSE_TOOL_CALL_FRAMES: &[&str] = &[
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":null,"tool_calls":[{"index":0,"id":"call_abc123","type":"function","function":{"name":"get_weather","arguments":""}}]},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"lo"}}]},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"cation\": \"Tokyo\"}"}}]},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
    "data: [DONE]",
];

fn translator() -> DynChatTranslator {
    Arc::new(ChatTranslator::new(
        Arc::new(ModelMapping::defaults()),
        TranslatorSettings::default(),
    ))
}

fn original() -> InboundRequest {
    let mut req = ChatRequest::new("llama2", vec![ChatMessage::user("Hi")]);
    req.stream = true;
    InboundRequest::Chat(req)
}

fn run_bridge(translator: &DynChatTranslator, frames: &[&str]) -> usize {
    let mut bridge = StreamBridge::new(translator.clone(), original());
    let mut emitted = 0;
    for frame in frames {
        if let Some(payload) = SseDecoder::payload(frame) {
            if matches!(bridge.push(payload), Ok(Some(_))) {
                emitted += 1;
            }
        }
    }
    emitted + usize::from(matches!(bridge.finish(), Ok(Some(_))))
}

fn bench_payload_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_payload");
    let all_frames: String = SSE_FRAMES.join("\n\n");
    group.throughput(Throughput::Bytes(all_frames.len() as u64));

    group.bench_function("extract_all_payloads", |b| {
        b.iter(|| {
            black_box(&all_frames)
                .lines()
                .filter_map(SseDecoder::payload)
                .count()
        })
    });
    group.finish();
}

fn bench_bridge(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_bridge");
    let t = translator();

    group.throughput(Throughput::Elements(SSE_FRAMES.len() as u64));
    group.bench_function("text_stream", |b| {
        b.iter(|| run_bridge(&t, black_box(SSE_FRAMES)))
    });

    group.throughput(Throughput::Elements(SSE_TOOL_CALL_FRAMES.len() as u64));
    group.bench_function("tool_call_stream", |b| {
        b.iter(|| run_bridge(&t, black_box(SSE_TOOL_CALL_FRAMES)))
    });
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let t = translator();
    let body: String = SSE_FRAMES.iter().map(|f| format!("{}\n\n", f)).collect();

    let mut group = c.benchmark_group("bytes_to_ndjson");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("full_pipeline", |b| {
        b.to_async(&rt).iter(|| {
            let chunks: Vec<ollama_openai_gateway::Result<Bytes>> = body
                .as_bytes()
                .chunks(64)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            let t = t.clone();
            async move {
                let payloads = SseDecoder::new().decode(Box::pin(futures::stream::iter(chunks)));
                let events = bridge_stream(payloads, StreamBridge::new(t, original()));
                ndjson_body(events).count().await
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_payload_extraction, bench_bridge, bench_end_to_end);
criterion_main!(benches);
