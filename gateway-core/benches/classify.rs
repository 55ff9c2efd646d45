//! Classification and redaction throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gateway_core::classify::ErrorClassifier;
use gateway_core::debug::RequestLogger;
use gateway_core::protocol::Options;
use gateway_core::providers::AdapterError;
use serde_json::json;
use std::collections::HashMap;

fn bench_classify(c: &mut Criterion) {
    let classifier = ErrorClassifier::new();
    let cases = [
        ("rate_limit", Some(429u16), "Rate limit reached for requests"),
        ("opaque_500", Some(500), "Something went wrong on our side"),
        ("no_status", None, "The model produced an answer we could not use"),
        ("hf_loading", Some(503), "Model facebook/bart-large-cnn is currently loading"),
    ];

    let mut group = c.benchmark_group("classify");
    for (name, status, message) in cases {
        group.bench_with_input(BenchmarkId::new("message", name), &(status, message), |b, (status, message)| {
            b.iter(|| classifier.classify(black_box("huggingface"), *status, black_box(message)))
        });
    }

    let structured = AdapterError::Status {
        status: 429,
        message: "You exceeded your current quota".to_string(),
        code: Some("insufficient_quota".to_string()),
    };
    group.bench_function("structured_code", |b| {
        b.iter(|| classifier.classify_adapter_error(black_box("openai"), black_box(&structured)))
    });
    group.finish();
}

fn bench_request_logging(c: &mut Criterion) {
    let logger = RequestLogger::new(true);
    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), "Bearer sk-bench-0123456789".to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    let payload = json!({
        "model": "gpt-4o-mini",
        "api_key": "sk-bench-0123456789",
        "messages": [{ "role": "user", "content": "Summarize the following text in two sentences." }],
        "max_tokens": 256
    });
    let options = Options::new();

    c.bench_function("log_request_redacted", |b| {
        b.iter(|| {
            logger.log_request(
                black_box("openai"),
                black_box("POST https://api.openai.com/v1/chat/completions"),
                &headers,
                &payload,
                &options,
            )
        })
    });
}

criterion_group!(benches, bench_classify, bench_request_logging);
criterion_main!(benches);
