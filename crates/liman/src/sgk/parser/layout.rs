//! Positioned text runs recovered from page content streams.

use lopdf::content::Operation;
use lopdf::{Document, Object};

use super::normalize::decode_pdf_bytes;

/// Vertical distance under which two runs belong to the same visual row.
const ROW_TOLERANCE: f32 = 2.5;
/// `TJ` adjustments wider than this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRow {
    pub page: u32,
    pub y: f32,
    /// Left to right.
    pub cells: Vec<TextRun>,
}

impl LayoutRow {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(self, tx: f32, ty: f32) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        Matrix([a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f])
    }
}

#[derive(Debug, Default)]
struct TextState {
    line: Option<Matrix>,
    text: Option<Matrix>,
    leading: f32,
    moved: bool,
}

impl TextState {
    fn begin(&mut self) {
        self.line = Some(Matrix::IDENTITY);
        self.text = Some(Matrix::IDENTITY);
        self.moved = true;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        let next = self.line.unwrap_or(Matrix::IDENTITY).translate(tx, ty);
        self.line = Some(next);
        self.text = Some(next);
        self.moved = true;
    }

    fn set_matrix(&mut self, values: [f32; 6]) {
        self.line = Some(Matrix(values));
        self.text = Some(Matrix(values));
        self.moved = true;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    fn position(&self) -> (f32, f32) {
        let Matrix([_, _, _, _, e, f]) = self.text.unwrap_or(Matrix::IDENTITY);
        (e, f)
    }
}

/// Text runs of one page in content-stream order. Consecutive show operators without a
/// repositioning in between extend the same run.
pub fn page_runs(document: &Document, page_id: lopdf::ObjectId) -> Result<Vec<TextRun>, lopdf::Error> {
    let content = document.get_and_decode_page_content(page_id)?;
    Ok(runs_from_operations(&content.operations))
}

pub(crate) fn runs_from_operations(operations: &[Operation]) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut state = TextState::default();

    for operation in operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "BT" => state.begin(),
            "ET" => state.moved = true,
            "TL" => state.leading = number(operands, 0).unwrap_or(0.0),
            "Td" => state.move_line(
                number(operands, 0).unwrap_or(0.0),
                number(operands, 1).unwrap_or(0.0),
            ),
            "TD" => {
                let ty = number(operands, 1).unwrap_or(0.0);
                state.leading = -ty;
                state.move_line(number(operands, 0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                let mut values = [0.0f32; 6];
                for (index, slot) in values.iter_mut().enumerate() {
                    *slot = number(operands, index).unwrap_or(0.0);
                }
                state.set_matrix(values);
            }
            "T*" => state.next_line(),
            "Tj" => emit(&mut runs, &mut state, shown_text(operands.first())),
            "'" => {
                state.next_line();
                emit(&mut runs, &mut state, shown_text(operands.first()));
            }
            "\"" => {
                state.next_line();
                emit(&mut runs, &mut state, shown_text(operands.get(2)));
            }
            "TJ" => emit(&mut runs, &mut state, shown_array(operands.first())),
            _ => {}
        }
    }

    runs
}

fn emit(runs: &mut Vec<TextRun>, state: &mut TextState, text: String) {
    if text.is_empty() {
        return;
    }
    if !state.moved {
        if let Some(last) = runs.last_mut() {
            last.text.push_str(&text);
            return;
        }
    }
    let (x, y) = state.position();
    runs.push(TextRun { x, y, text });
    state.moved = false;
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|object| object.as_float().ok())
}

fn shown_text(object: Option<&Object>) -> String {
    match object {
        Some(Object::String(bytes, _)) => decode_pdf_bytes(bytes),
        _ => String::new(),
    }
}

fn shown_array(object: Option<&Object>) -> String {
    let Some(Object::Array(items)) = object else {
        return shown_text(object);
    };
    let mut text = String::new();
    for item in items {
        match item {
            Object::String(bytes, _) => text.push_str(&decode_pdf_bytes(bytes)),
            other => {
                if let Ok(adjustment) = other.as_float() {
                    if -adjustment > TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
    }
    text
}

/// Group runs into visual rows, top of the page first.
pub fn group_rows(page: u32, mut runs: Vec<TextRun>) -> Vec<LayoutRow> {
    runs.retain(|run| !run.text.trim().is_empty());
    runs.sort_by(|left, right| right.y.total_cmp(&left.y).then(left.x.total_cmp(&right.x)));

    let mut rows: Vec<LayoutRow> = Vec::new();
    for run in runs {
        match rows.last_mut() {
            Some(row) if (row.y - run.y).abs() <= ROW_TOLERANCE => row.cells.push(run),
            _ => rows.push(LayoutRow {
                page,
                y: run.y,
                cells: vec![run],
            }),
        }
    }
    for row in &mut rows {
        row.cells.sort_by(|left, right| left.x.total_cmp(&right.x));
    }
    rows
}
