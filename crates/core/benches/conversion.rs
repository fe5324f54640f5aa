//! Benchmarks for the processor's orchestration overhead.
//!
//! The engine returns a canned PDF immediately, so the numbers cover
//! validation, provider lookup, progress reporting and ticker setup only.
//!
//! Run with: cargo bench --package office-to-pdf-core

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use office_to_pdf_core::{
    progress, ConverterProvider, DocumentFamily, InputFile, PdfEngine, ProcessInput, Processor,
    ProcessorConfig, ProgressCallback,
};
use std::sync::Arc;
use std::time::Duration;

struct InstantEngine;

#[async_trait]
impl PdfEngine for InstantEngine {
    fn name(&self) -> &str {
        "instant"
    }

    async fn initialize(&self, progress: ProgressCallback) -> office_to_pdf_core::Result<()> {
        progress(100, "ready");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn convert_to_pdf(&self, _file: &InputFile) -> office_to_pdf_core::Result<Vec<u8>> {
        Ok(b"%PDF-1.7".to_vec())
    }
}

fn benchmark_process(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let provider = Arc::new(ConverterProvider::new(|| {
        Ok(Arc::new(InstantEngine) as Arc<dyn PdfEngine>)
    }));
    let processor = Processor::new(DocumentFamily::Document, provider, ProcessorConfig::default())
        .unwrap();
    let input = ProcessInput::single(InputFile::from_bytes("bench.docx", vec![0u8; 4096]));

    let mut group = c.benchmark_group("process");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("success_no_callback", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(processor.process(input.clone(), None).await) });
    });

    group.bench_function("success_with_callback", |b| {
        let cb = progress::callback(|percent, message| {
            black_box((percent, message.len()));
        });
        b.to_async(&runtime).iter(|| async {
            black_box(processor.process(input.clone(), Some(Arc::clone(&cb))).await)
        });
    });

    group.bench_function("rejected_extension", |b| {
        let bad = ProcessInput::single(InputFile::from_bytes("bench.xlsx", vec![0u8; 16]));
        b.to_async(&runtime)
            .iter(|| async { black_box(processor.process(bad.clone(), None).await) });
    });

    group.finish();
}

criterion_group!(benches, benchmark_process);
criterion_main!(benches);
