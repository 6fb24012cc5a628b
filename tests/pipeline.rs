//! End-to-end batch tests with deterministic stand-in services.
//!
//! The OCR stand-in answers by image bytes and the generator stand-in by
//! the OCR text embedded in the prompt, so each test scripts exactly what
//! every stage returns. No network access is needed.

use async_trait::async_trait;
use intake_extract::{
    extract_batch, extract_batch_sync, process_directory, process_directory_sync, BatchConfig, BatchProgressCallback, GenerationError,
    GenerationRequest, ImageError, IntakeError, OcrError, PatientRecord, TextExtractor,
    TextGenerator,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const JOEL_OCR: &str = "Name: Joel\nPhone: 555-1111";
const JOEL_TABLE: &str = "Name|Phone|Email|CPF|DOB|Address\n\
                          Joel|555-1111|x@y.com|123.456.789-00|01/01/1990|123 Main St";

/// OCR keyed by image bytes; unknown bytes or `None` fail the call.
#[derive(Default)]
struct ScriptedOcr {
    replies: HashMap<Vec<u8>, Option<String>>,
}

impl ScriptedOcr {
    fn reply(mut self, image: &[u8], text: Option<&str>) -> Self {
        self.replies
            .insert(image.to_vec(), text.map(str::to_string));
        self
    }
}

#[async_trait]
impl TextExtractor for ScriptedOcr {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        match self.replies.get(image) {
            Some(Some(text)) => Ok(text.clone()),
            Some(None) => Err(OcrError::Service {
                status: Some(500),
                message: "backend unavailable".into(),
            }),
            None => Ok(String::new()),
        }
    }
}

/// Generator keyed by OCR text; counts calls and checks determinism.
#[derive(Default)]
struct ScriptedGenerator {
    replies: Vec<(String, Option<String>)>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn reply(mut self, ocr_text: &str, table: Option<&str>) -> Self {
        self.replies
            .push((ocr_text.to_string(), table.map(str::to_string)));
        self
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.deterministic, "structuring must be deterministic");
        for (ocr_text, reply) in &self.replies {
            if request.prompt.contains(ocr_text.as_str()) {
                return reply
                    .clone()
                    .ok_or_else(|| GenerationError("model overloaded".into()));
            }
        }
        Err(GenerationError("unexpected prompt".into()))
    }
}

fn write_image(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).unwrap();
}

fn config(ocr: ScriptedOcr, gen: Arc<ScriptedGenerator>) -> BatchConfig {
    BatchConfig::builder()
        .extractor(Arc::new(ocr))
        .generator(gen)
        .build()
        .expect("valid config")
}

fn record(cells: [&str; 6]) -> PatientRecord {
    PatientRecord::from_cells(&cells).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_image_produces_one_record_without_header() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "form.png", b"joel");

    let gen = Arc::new(ScriptedGenerator::default().reply(JOEL_OCR, Some(JOEL_TABLE)));
    let cfg = config(ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)), gen);

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(
        output.records,
        vec![record([
            "Joel",
            "555-1111",
            "x@y.com",
            "123.456.789-00",
            "01/01/1990",
            "123 Main St"
        ])]
    );

    let out_path = out.path().join("patients.csv");
    let report = process_directory(input.path(), &out_path, &cfg).await.unwrap();
    assert_eq!(report.output_path.as_deref(), Some(out_path.as_path()));
    assert_eq!(report.stats.total_records, 1);

    let csv = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(
        csv,
        "Name,Phone,Email,CPF,Date of Birth,Address\n\
         Joel,555-1111,x@y.com,123.456.789-00,01/01/1990,123 Main St\n"
    );
}

#[tokio::test]
async fn empty_ocr_writes_nothing() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "blank.jpg", b"blank");

    let gen = Arc::new(ScriptedGenerator::default());
    let cfg = config(ScriptedOcr::default(), Arc::clone(&gen));

    let out_path = out.path().join("patients.csv");
    let report = process_directory(input.path(), &out_path, &cfg).await.unwrap();

    assert!(report.output_path.is_none());
    assert!(!out_path.exists());
    assert_eq!(report.stats.total_images, 1);
    assert_eq!(report.stats.failed_images, 1);
    assert_eq!(report.stats.total_records, 0);
    assert_eq!(gen.calls.load(Ordering::SeqCst), 0, "generator must not run");

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(
        output.images[0].error,
        Some(ImageError::NoText {
            image: "blank.jpg".into()
        })
    );
}

#[tokio::test]
async fn ocr_service_error_is_skipped_like_empty_text() {
    let input = TempDir::new().unwrap();
    write_image(input.path(), "a.png", b"boom");

    let gen = Arc::new(ScriptedGenerator::default());
    let cfg = config(ScriptedOcr::default().reply(b"boom", None), gen);

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    assert!(output.records.is_empty());
    assert!(matches!(output.images[0].error, Some(ImageError::NoText { .. })));
}

#[tokio::test]
async fn generation_failure_drops_only_that_image() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "a.png", b"fails");
    write_image(input.path(), "b.png", b"joel");

    let ocr = ScriptedOcr::default()
        .reply(b"fails", Some("Name: Ghost"))
        .reply(b"joel", Some(JOEL_OCR));
    let gen = Arc::new(
        ScriptedGenerator::default()
            .reply("Name: Ghost", None)
            .reply(JOEL_OCR, Some(JOEL_TABLE)),
    );
    let cfg = config(ocr, Arc::clone(&gen));

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].name, "Joel");
    assert_eq!(output.images.len(), 2);
    assert!(matches!(
        output.images[0].error,
        Some(ImageError::NoStructuredText { .. })
    ));
    assert!(output.images[1].is_success());
    assert_eq!(output.images[1].record_count, 1);

    let out_path = out.path().join("patients.json");
    let report = process_directory(input.path(), &out_path, &cfg).await.unwrap();
    assert_eq!(report.stats.processed_images, 1);
    assert_eq!(report.stats.failed_images, 1);
    let written: Vec<PatientRecord> =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, output.records);
}

#[tokio::test]
async fn records_follow_image_order_then_line_order() {
    let input = TempDir::new().unwrap();
    write_image(input.path(), "02-maria.png", b"maria");
    write_image(input.path(), "01-ana.PNG", b"ana");
    write_image(input.path(), "03-none.jpeg", b"nothing-parseable");

    let ocr = ScriptedOcr::default()
        .reply(b"ana", Some("NOME: Ana"))
        .reply(b"maria", Some("NOME: Maria"))
        .reply(b"nothing-parseable", Some("NOME: ???"));
    let gen = Arc::new(
        ScriptedGenerator::default()
            .reply(
                "NOME: Ana",
                Some("| Ana | 1 | a@x | c | d | e |\n| Ana | 2 | a@x | c | d | e |"),
            )
            .reply("NOME: Maria", Some("| Maria | 3 | m@x | c | d | e |"))
            .reply("NOME: ???", Some("I could not find a table in this text.")),
    );
    let cfg = config(ocr, gen);

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    let keys: Vec<(&str, &str)> = output
        .records
        .iter()
        .map(|r| (r.name.as_str(), r.phone.as_str()))
        .collect();
    assert_eq!(keys, vec![("Ana", "1"), ("Ana", "2"), ("Maria", "3")]);
    assert!(matches!(output.images[2].error, Some(ImageError::NoRecords { .. })));
}

#[tokio::test]
async fn no_supported_images_is_fatal() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "notes.txt", b"hello");
    write_image(input.path(), "scan.pdf", b"%PDF");

    let gen = Arc::new(ScriptedGenerator::default());
    let cfg = config(ScriptedOcr::default(), Arc::clone(&gen));

    let out_path = out.path().join("patients.csv");
    let err = process_directory(input.path(), &out_path, &cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::NoImagesFound { .. }), "got {err:?}");
    assert!(!out_path.exists());
    assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multiple_phones_become_multiple_rows() {
    let input = TempDir::new().unwrap();
    write_image(input.path(), "joel.tiff", b"joel");

    let table = "\
| Name | Phone | Email | CPF | Date of Birth | Address |
|------|-------|-------|-----|---------------|---------|
| Joel | 555-1111 | x@y.com | 123.456.789-00 | 01/01/1990 | 123 Main St |
| Joel | 555-2222 | x@y.com | 123.456.789-00 | 01/01/1990 | 123 Main St |
| Joel | 555-3333 | x@y.com | 123.456.789-00 | 01/01/1990 | 123 Main St |";
    let gen = Arc::new(ScriptedGenerator::default().reply(JOEL_OCR, Some(table)));
    let cfg = config(ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)), gen);

    let output = extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(output.records.len(), 3);
    let phones: Vec<&str> = output.records.iter().map(|r| r.phone.as_str()).collect();
    assert_eq!(phones, vec!["555-1111", "555-2222", "555-3333"]);
    for r in &output.records {
        let mut same = r.clone();
        same.phone = output.records[0].phone.clone();
        assert_eq!(same, output.records[0]);
    }
}

#[tokio::test]
async fn rerunning_the_same_batch_is_identical() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "a.png", b"joel");
    write_image(input.path(), "b.png", b"joel");

    let gen = Arc::new(ScriptedGenerator::default().reply(JOEL_OCR, Some(JOEL_TABLE)));
    let cfg = config(ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)), gen);

    let first = extract_batch(input.path(), &cfg).await.unwrap();
    let second = extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(first.records.len(), 2);

    let p1 = out.path().join("one.csv");
    let p2 = out.path().join("two.csv");
    process_directory(input.path(), &p1, &cfg).await.unwrap();
    process_directory(input.path(), &p2, &cfg).await.unwrap();
    assert_eq!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
}

#[tokio::test]
async fn writer_failure_reports_no_output() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "a.png", b"joel");

    let gen = Arc::new(ScriptedGenerator::default().reply(JOEL_OCR, Some(JOEL_TABLE)));
    let cfg = config(ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)), gen);

    let out_path = out.path().join("taken.csv");
    std::fs::create_dir(&out_path).unwrap();

    let report = process_directory(input.path(), &out_path, &cfg).await.unwrap();
    assert!(report.output_path.is_none());
    assert_eq!(report.stats.total_records, 1);
}

#[tokio::test]
async fn progress_events_follow_the_batch() {
    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl BatchProgressCallback for Events {
        fn on_batch_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_image_start(&self, index: usize, _total: usize, name: &str) {
            self.0.lock().unwrap().push(format!("image {index} {name}"));
        }
        fn on_image_complete(&self, index: usize, _total: usize, records: usize) {
            self.0.lock().unwrap().push(format!("ok {index} {records}"));
        }
        fn on_image_error(&self, index: usize, _total: usize, _error: &str) {
            self.0.lock().unwrap().push(format!("err {index}"));
        }
        fn on_batch_complete(&self, total: usize, success: usize, records: usize) {
            self.0
                .lock()
                .unwrap()
                .push(format!("done {total} {success} {records}"));
        }
    }

    let input = TempDir::new().unwrap();
    write_image(input.path(), "a.png", b"joel");
    write_image(input.path(), "b.png", b"blank");

    let events = Arc::new(Events::default());
    let cfg = BatchConfig::builder()
        .extractor(Arc::new(
            ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)),
        ))
        .generator(Arc::new(
            ScriptedGenerator::default().reply(JOEL_OCR, Some(JOEL_TABLE)),
        ))
        .progress_callback(Arc::clone(&events) as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();

    extract_batch(input.path(), &cfg).await.unwrap();
    assert_eq!(
        *events.0.lock().unwrap(),
        vec![
            "start 2",
            "image 1 a.png",
            "ok 1 1",
            "image 2 b.png",
            "err 2",
            "done 2 1 1",
        ]
    );
}

#[test]
fn sync_wrappers_run_without_an_outer_runtime() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_image(input.path(), "form.png", b"joel");

    let gen = Arc::new(ScriptedGenerator::default().reply(JOEL_OCR, Some(JOEL_TABLE)));
    let cfg = config(
        ScriptedOcr::default().reply(b"joel", Some(JOEL_OCR)),
        gen.clone(),
    );

    let output = extract_batch_sync(input.path(), &cfg).unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].name, "Joel");

    let out_path = out.path().join("patients.xlsx");
    let report = process_directory_sync(input.path(), &out_path, &cfg).unwrap();
    assert_eq!(report.output_path.as_deref(), Some(out_path.as_path()));
    assert_eq!(report.stats.total_records, 1);
    assert!(std::fs::metadata(&out_path).unwrap().len() > 0);
    assert_eq!(gen.calls.load(Ordering::SeqCst), 2);
}
