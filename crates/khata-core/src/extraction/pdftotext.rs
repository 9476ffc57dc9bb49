use crate::error::KhataError;
use crate::extraction::table::{rows_to_grid, words_to_rows, Word};
use crate::extraction::{split_pages, CellGrid, PageContent, PdfExtractor};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Vertical slack (points) for words sharing a table row.
const ROW_TOLERANCE: f32 = 3.0;
/// Horizontal gap (points) that separates two table cells.
const CELL_GAP: f32 = 7.0;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -layout` for line text and `-bbox-layout` for positioned
/// words. Every invocation runs against a wall-clock budget.
pub struct PdftotextExtractor {
    timeout: Duration,
}

impl PdftotextExtractor {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        PdftotextExtractor { timeout }
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }

    /// Run pdftotext on a temp copy of the input.
    fn run(
        &self,
        pdf_bytes: &[u8],
        passphrase: Option<&str>,
        mode: &str,
    ) -> Result<String, KhataError> {
        let output = with_input_file(pdf_bytes, |path| {
            let mut cmd = Command::new("pdftotext");
            cmd.arg(mode);
            if let Some(pw) = passphrase {
                cmd.arg("-upw").arg(pw);
            }
            cmd.arg(path).arg("-");

            let started = Instant::now();
            let output = run_with_deadline(cmd, self.timeout)?;
            debug!(mode, elapsed_ms = started.elapsed().as_millis() as u64, "pdftotext finished");
            Ok(output)
        })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if is_password_error(&stderr) {
                return Err(KhataError::DecryptionFailed {
                    passphrase_supplied: passphrase.is_some(),
                });
            }
            warn!(code, %stderr, "pdftotext failed");
            return Err(KhataError::ConverterFailed { code, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(
        &self,
        pdf_bytes: &[u8],
        passphrase: Option<&str>,
    ) -> Result<Vec<PageContent>, KhataError> {
        let text = self.run(pdf_bytes, passphrase, "-layout")?;
        Ok(split_pages(&text))
    }

    fn extract_grid(
        &self,
        pdf_bytes: &[u8],
        passphrase: Option<&str>,
    ) -> Result<Vec<CellGrid>, KhataError> {
        let xml = self.run(pdf_bytes, passphrase, "-bbox-layout")?;
        let words = parse_bbox_words(&xml)?;
        let last_page = words.iter().map(|w| w.page_number).max().unwrap_or(0);

        let grids = (1..=last_page)
            .map(|page| {
                let page_words: Vec<Word> = words
                    .iter()
                    .filter(|w| w.page_number == page)
                    .cloned()
                    .collect();
                CellGrid {
                    name: format!("page {page}"),
                    rows: rows_to_grid(&words_to_rows(&page_words, ROW_TOLERANCE, CELL_GAP)),
                }
            })
            .filter(|g| !g.rows.is_empty())
            .collect();
        Ok(grids)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

fn is_password_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("incorrect password") || lower.contains("encrypted")
}

/// Write `bytes` to a temp file and hand its path to `f`. The file is
/// removed when this returns, whatever `f` returned.
fn with_input_file<T>(
    bytes: &[u8],
    f: impl FnOnce(&Path) -> Result<T, KhataError>,
) -> Result<T, KhataError> {
    let mut tmpfile =
        tempfile::NamedTempFile::new().map_err(|e| KhataError::Extraction(e.to_string()))?;
    tmpfile
        .write_all(bytes)
        .map_err(|e| KhataError::Extraction(e.to_string()))?;
    f(tmpfile.path())
}

/// Spawn `cmd` and wait for it, killing the child once `timeout` elapses.
fn run_with_deadline(mut cmd: Command, timeout: Duration) -> Result<Output, KhataError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KhataError::PdftotextNotFound
            } else {
                KhataError::Extraction(format!("pdftotext failed: {}", e))
            }
        })?;

    // Drain pipes on threads so a chatty child cannot block on a full buffer.
    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            warn!(seconds = timeout.as_secs(), "pdftotext timed out, child killed");
            return Err(KhataError::ExtractionTimeout {
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Parse `pdftotext -bbox-layout` XHTML into positioned words.
fn parse_bbox_words(xml: &str) -> Result<Vec<Word>, KhataError> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut words = Vec::new();
    let mut page = 0usize;
    let mut pending: Option<Word> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => page += 1,
                b"word" => pending = word_from_tag(&e, page),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(word) = pending.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| KhataError::Extraction(format!("bbox text: {e}")))?;
                    word.text.push_str(text.trim());
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => {
                if let Some(word) = pending.take() {
                    if !word.text.is_empty() {
                        words.push(word);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(KhataError::Extraction(format!(
                    "malformed bbox output at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(words)
}

fn word_from_tag(tag: &BytesStart<'_>, page: usize) -> Option<Word> {
    let mut x_min = None;
    let mut y_min = None;
    let mut x_max = None;
    let mut y_max = None;

    for attr in tag.attributes().flatten() {
        let value = attr.unescape_value().ok()?;
        let parsed: Option<f32> = value.trim().parse().ok();
        match attr.key.as_ref() {
            b"xMin" => x_min = parsed,
            b"yMin" => y_min = parsed,
            b"xMax" => x_max = parsed,
            b"yMax" => y_max = parsed,
            _ => {}
        }
    }

    Some(Word {
        page_number: page,
        x_min: x_min?,
        y_min: y_min?,
        x_max: x_max?,
        y_max: y_max?,
        text: String::new(),
    })
}
