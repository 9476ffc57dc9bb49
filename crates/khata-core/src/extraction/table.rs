//! Rebuild table cells from positioned text.
//!
//! Both `pdftotext -layout` lines (character columns) and `-bbox-layout`
//! words (points) reduce to horizontal spans; cells are recovered by
//! splitting on wide gaps and assigning each span to the header column it
//! overlaps most.

/// A run of text with a horizontal extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

/// A positioned word from bbox output.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub page_number: usize,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub text: String,
}

/// Split a layout line into segments separated by 2+ spaces.
pub fn split_by_whitespace_gaps(line: &str) -> Vec<&str> {
    layout_spans(line)
        .into_iter()
        .map(|(start, end)| &line[start..end])
        .collect()
}

/// Character spans of a layout line, keyed by column position.
pub fn line_spans(line: &str) -> Vec<Span> {
    let char_col = |byte: usize| line[..byte].chars().count() as f32;
    layout_spans(line)
        .into_iter()
        .map(|(start, end)| Span {
            start: char_col(start),
            end: char_col(end),
            text: line[start..end].to_string(),
        })
        .collect()
}

/// Byte ranges of segments separated by at least two whitespace characters.
fn layout_spans(line: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut seg_start: Option<usize> = None;
    let mut last_end = 0;
    let mut gap = 0;

    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            gap += 1;
            if gap >= 2 {
                if let Some(start) = seg_start.take() {
                    out.push((start, last_end));
                }
            }
        } else {
            if seg_start.is_none() {
                seg_start = Some(i);
            }
            gap = 0;
            last_end = i + c.len_utf8();
        }
    }
    if let Some(start) = seg_start {
        out.push((start, last_end));
    }
    out
}

/// Place row spans under header columns. Returns one cell per header span.
///
/// Each span goes to the column it overlaps most; with no overlap, to the
/// nearest column centre. Spans landing in the same column are joined.
pub fn align_to_header(header: &[Span], row: &[Span]) -> Vec<String> {
    let mut cells = vec![String::new(); header.len()];
    if header.is_empty() {
        return cells;
    }

    for span in row {
        let mut best = 0;
        let mut best_overlap = f32::MIN;
        for (i, col) in header.iter().enumerate() {
            let overlap = span.end.min(col.end) - span.start.max(col.start);
            if overlap > best_overlap {
                best_overlap = overlap;
                best = i;
            }
        }
        if best_overlap <= 0.0 {
            let centre = (span.start + span.end) / 2.0;
            best = header
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = ((a.start + a.end) / 2.0 - centre).abs();
                    let db = ((b.start + b.end) / 2.0 - centre).abs();
                    da.total_cmp(&db)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
        let cell = &mut cells[best];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(span.text.trim());
    }

    cells
}

/// Group words into visual rows, then into spans separated by wide gaps.
///
/// `row_tolerance` is the vertical slack for words on one baseline;
/// `cell_gap` the horizontal distance that starts a new cell.
pub fn words_to_rows(words: &[Word], row_tolerance: f32, cell_gap: f32) -> Vec<Vec<Span>> {
    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| {
        a.page_number
            .cmp(&b.page_number)
            .then(a.y_min.total_cmp(&b.y_min))
            .then(a.x_min.total_cmp(&b.x_min))
    });

    let mut rows: Vec<Vec<&Word>> = Vec::new();
    for word in sorted {
        match rows.last_mut() {
            Some(row)
                if row[0].page_number == word.page_number
                    && (word.y_min - row[0].y_min).abs() <= row_tolerance =>
            {
                row.push(word)
            }
            _ => rows.push(vec![word]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x_min.total_cmp(&b.x_min));
            let mut spans: Vec<Span> = Vec::new();
            for word in row {
                match spans.last_mut() {
                    Some(span) if word.x_min - span.end < cell_gap => {
                        span.text.push(' ');
                        span.text.push_str(&word.text);
                        span.end = span.end.max(word.x_max);
                    }
                    _ => spans.push(Span {
                        start: word.x_min,
                        end: word.x_max,
                        text: word.text.clone(),
                    }),
                }
            }
            spans
        })
        .collect()
}

/// Align every row to the first widest row, taken as the column header.
pub fn rows_to_grid(rows: &[Vec<Span>]) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let Some(header) = rows.iter().find(|r| r.len() == width) else {
        return Vec::new();
    };
    rows.iter().map(|row| align_to_header(header, row)).collect()
}
