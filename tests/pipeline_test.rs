//! Integration tests for wikistream
//!
//! These tests drive the whole pipeline (parser, workers, writer, shutdown)
//! over in-memory dumps and temporary output files.

use std::collections::HashSet;
use std::future::Future;
use std::io::{Cursor, Write};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use wikistream::config::PipelineConfig;
use wikistream::import::{
    ImportCoordinator, ImportCoordinatorBuilder, ImportError, JsonLinesEncoder, PageUnit,
    RecordEncoder,
};

const SAMPLE_XML: &str = r#"<mediawiki>
  <page>
    <title>Alpha</title>
    <ns>0</ns>
    <revision><text>First body</text></revision>
  </page>
  <page>
    <title>Talk:Alpha</title>
    <ns>1</ns>
    <revision><text>Talk body</text></revision>
  </page>
  <page>
    <title>Beta</title>
    <ns>0</ns>
    <revision><text>Second &amp; last</text></revision>
  </page>
</mediawiki>
"#;

fn dump_with_pages(count: usize) -> String {
    let mut xml = String::from("<mediawiki>\n");
    for i in 0..count {
        xml.push_str(&format!(
            "  <page><title>Page {i}</title><ns>0</ns><revision><text>Body of page {i}</text></revision></page>\n"
        ));
    }
    xml.push_str("</mediawiki>\n");
    xml
}

fn test_config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        poll_timeout_ms: 20,
        intake_capacity: 8,
        outtake_capacity: 8,
        join_timeout_secs: 5,
        ..PipelineConfig::default()
    }
}

fn coordinator(workers: usize) -> ImportCoordinator {
    ImportCoordinatorBuilder::new()
        .with_config(test_config(workers))
        .build()
        .unwrap()
}

async fn run_xml(
    coordinator: &ImportCoordinator,
    xml: &str,
    output: &Path,
) -> wikistream::ImportReport {
    let sink = tokio::fs::File::create(output).await.unwrap();
    coordinator
        .run_streams(Cursor::new(xml.as_bytes().to_vec()), sink)
        .await
}

fn read_records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn titles(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_main_namespace_pages_become_lines() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("articles.jsonl");

    let report = run_xml(&coordinator(1), SAMPLE_XML, &output).await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.stats.pages_seen, 3);
    assert_eq!(report.stats.articles_accepted, 2);
    assert_eq!(report.stats.records_written, 2);
    assert_eq!(report.stats.records_dropped, 0);

    let records = read_records(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["title"], "Alpha");
    assert_eq!(records[0]["raw_text"], "First body");
    assert_eq!(records[1]["title"], "Beta");
    assert_eq!(records[1]["raw_text"], "Second & last");
    assert_eq!(records[0].as_object().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_dump_produces_empty_output() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("empty.jsonl");

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        run_xml(&coordinator(3), "<mediawiki></mediawiki>", &output),
    )
    .await
    .expect("pipeline should shut down on its own");

    assert!(report.is_success());
    assert_eq!(report.stats.pages_seen, 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_records_lost_across_workers() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("many.jsonl");
    let xml = dump_with_pages(500);

    let report = run_xml(&coordinator(4), &xml, &output).await;

    assert!(report.is_success());
    assert_eq!(report.stats.articles_accepted, 500);
    assert_eq!(report.stats.records_written, 500);

    let written: HashSet<String> = titles(&read_records(&output)).into_iter().collect();
    let expected: HashSet<String> = (0..500).map(|i| format!("Page {i}")).collect();
    assert_eq!(written, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_preserves_input_order() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("ordered.jsonl");
    let xml = dump_with_pages(100);

    let report = run_xml(&coordinator(1), &xml, &output).await;
    assert!(report.is_success());

    let expected: Vec<String> = (0..100).map(|i| format!("Page {i}")).collect();
    assert_eq!(titles(&read_records(&output)), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parse_error_still_flushes_queued_records() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("partial.jsonl");
    let truncated = r#"<mediawiki>
  <page><title>Kept One</title><ns>0</ns><revision><text>a</text></revision></page>
  <page><title>Kept Two</title><ns>0</ns><revision><text>b</text></revision></page>
  <page><title>Cut</title><ns>0</ns><revision><text>never fin"#;

    let report = run_xml(&coordinator(2), truncated, &output).await;

    assert!(!report.is_success());
    assert!(report.parse_error.is_some());
    assert!(report.writer_error.is_none());
    assert_eq!(report.abandoned_tasks, 0);

    let mut written = titles(&read_records(&output));
    written.sort();
    assert_eq!(written, vec!["Kept One", "Kept Two"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_encode_failures_are_dropped_not_fatal() {
    struct SkipOdd;

    impl RecordEncoder for SkipOdd {
        fn encode(&self, page: &PageUnit) -> Result<String, ImportError> {
            let n: u32 = page.title.trim_start_matches("Page ").parse().unwrap_or(0);
            if n % 2 == 1 {
                return Err(ImportError::Encode {
                    title: page.title.clone(),
                    reason: "odd page".to_string(),
                });
            }
            JsonLinesEncoder.encode(page)
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("even.jsonl");
    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(test_config(3))
        .with_encoder(Arc::new(SkipOdd))
        .build()
        .unwrap();

    let report = run_xml(&coordinator, &dump_with_pages(10), &output).await;

    assert!(report.is_success());
    assert_eq!(report.stats.records_written, 5);
    assert_eq!(report.stats.records_dropped, 5);
    assert_eq!(read_records(&output).len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_custom_filter_and_max_articles() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("limited.jsonl");
    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(PipelineConfig {
            max_articles: Some(3),
            ..test_config(2)
        })
        .with_filter(Arc::new(|ns: Option<i32>| ns == Some(0)))
        .build()
        .unwrap();

    let report = run_xml(&coordinator, &dump_with_pages(50), &output).await;

    assert!(report.is_success());
    assert_eq!(report.stats.articles_accepted, 3);
    assert_eq!(read_records(&output).len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_reads_bzip2_dump_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pages-articles.xml.bz2");
    let output = temp_dir.path().join("articles.jsonl");

    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(SAMPLE_XML.as_bytes()).unwrap();
    std::fs::write(&input, encoder.finish().unwrap()).unwrap();

    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(test_config(2))
        .with_paths(&input, &output)
        .build()
        .unwrap();

    let report = coordinator.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.pages_seen, 3);
    let mut written = titles(&read_records(&output));
    written.sort();
    assert_eq!(written, vec!["Alpha", "Beta"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_input_fails_before_pipeline_starts() {
    let temp_dir = TempDir::new().unwrap();
    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(test_config(1))
        .with_paths(
            temp_dir.path().join("nope.xml.bz2"),
            temp_dir.path().join("out.jsonl"),
        )
        .build()
        .unwrap();

    assert!(matches!(
        coordinator.run().await,
        Err(ImportError::Open { .. })
    ));
}

/// Sink that takes `delay` to accept each large write and counts them
struct SlowSink {
    delay: Duration,
    pending: Option<Pin<Box<tokio::time::Sleep>>>,
    records: Arc<AtomicU64>,
}

impl AsyncWrite for SlowSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let delay = self.delay;
        let sleep = self
            .pending
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(delay)));
        if sleep.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }
        self.pending = None;

        // Records are larger than the writer's buffer, so each one arrives as a
        // single write; the buffered newlines arrive separately
        if buf.len() > 1 {
            self.records.fetch_add(1, Ordering::SeqCst);
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_writer_holds_back_parser() {
    const PAGES: u64 = 120;
    const CAPACITY: u64 = 4;
    const WORKERS: u64 = 2;
    // Queued on both channels, one page per worker, one in the blocked parser
    // send and one in the writer
    const IN_FLIGHT: u64 = 2 * CAPACITY + WORKERS + 2;

    let body = "x".repeat(16 * 1024);
    let mut xml = String::from("<mediawiki>\n");
    for i in 0..PAGES {
        xml.push_str(&format!(
            "<page><title>Page {i}</title><ns>0</ns><text>{body}</text></page>\n"
        ));
    }
    xml.push_str("</mediawiki>\n");

    let parsed = Arc::new(AtomicU64::new(0));
    let counter = parsed.clone();
    let written = Arc::new(AtomicU64::new(0));

    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(PipelineConfig {
            intake_capacity: CAPACITY as usize,
            outtake_capacity: CAPACITY as usize,
            ..test_config(WORKERS as usize)
        })
        .with_filter(Arc::new(move |ns: Option<i32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            ns == Some(0)
        }))
        .build()
        .unwrap();

    let sink = SlowSink {
        delay: Duration::from_millis(5),
        pending: None,
        records: written.clone(),
    };
    let run = tokio::spawn(async move {
        coordinator
            .run_streams(Cursor::new(xml.into_bytes()), sink)
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut samples = 0;
    while !run.is_finished() {
        // Parsed first, so the difference can only be overstated by a late read
        let seen = parsed.load(Ordering::SeqCst);
        let done = written.load(Ordering::SeqCst);
        assert!(
            seen - done.min(seen) <= IN_FLIGHT,
            "parser ran ahead: {seen} parsed, {done} written"
        );
        if samples == 0 {
            assert!(seen < PAGES, "parser finished before the writer caught up");
        }
        samples += 1;
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(samples > 0);

    let report = run.await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.stats.records_written, PAGES);
    assert_eq!(written.load(Ordering::SeqCst), PAGES);
}
