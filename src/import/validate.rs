//! Row validation and duplicate collapsing.

use super::{ColumnMapping, DecodedTable, ImportField, ImportRow, PointsSource};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

/// Points given to each question when no points column is mapped.
pub const DEFAULT_POINTS: u32 = 5;

/// A validated multiple-choice question ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedQuestion {
    pub question_text: String,
    /// Options A-D. Missing C/D are empty strings, never omitted.
    pub options: [String; 4],
    /// 0-based index into `options`.
    pub correct_index: u8,
    pub points: u32,
    /// Source line the question came from.
    pub line: usize,
}

impl ImportedQuestion {
    pub fn correct_letter(&self) -> char {
        char::from(b'A' + self.correct_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowProblem {
    MissingQuestion,
    MissingRequiredOptions,
    MissingAnswer,
    InvalidAnswer,
    InvalidPoints,
}

impl fmt::Display for RowProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RowProblem::MissingQuestion => "question is empty",
            RowProblem::MissingRequiredOptions => "options A and B are required",
            RowProblem::MissingAnswer => "correct answer is empty",
            RowProblem::InvalidAnswer => "correct answer must be A, B, C or D",
            RowProblem::InvalidPoints => "points must be a positive whole number",
        };
        f.write_str(msg)
    }
}

/// One validation message tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub problem: RowProblem,
    pub message: String,
}

impl RowIssue {
    fn new(line: usize, problem: RowProblem) -> Self {
        Self {
            line,
            problem,
            message: format!("line {}: {}", line, problem),
        }
    }
}

/// Result of validating every row of a table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub accepted: Vec<ImportedQuestion>,
    pub issues: Vec<RowIssue>,
    /// Rows with nothing in any mapped column.
    pub skipped_blank: usize,
}

impl ValidationReport {
    /// Number of distinct rows that produced at least one issue.
    pub fn rejected_rows(&self) -> usize {
        self.issues
            .iter()
            .map(|i| i.line)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Validate each row independently. Bad rows are reported and skipped.
///
/// `mapping` is expected to have passed [`ColumnMapping::check`].
pub fn validate_rows(table: &DecodedTable, mapping: &ColumnMapping) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mapped = mapping.mapped_columns();

    for row in &table.rows {
        if mapped.iter().all(|header| row.get(header).is_empty()) {
            report.skipped_blank += 1;
            continue;
        }
        match validate_row(row, mapping) {
            Ok(question) => report.accepted.push(question),
            Err(problems) => {
                tracing::debug!("line {} rejected: {:?}", row.line, problems);
                report
                    .issues
                    .extend(problems.into_iter().map(|p| RowIssue::new(row.line, p)));
            }
        }
    }

    report
}

fn cell<'a>(row: &'a ImportRow, mapping: &ColumnMapping, field: ImportField) -> &'a str {
    mapping.column(field).map(|h| row.get(h)).unwrap_or("")
}

fn validate_row(row: &ImportRow, mapping: &ColumnMapping) -> Result<ImportedQuestion, Vec<RowProblem>> {
    let mut problems = Vec::new();

    let question = cell(row, mapping, ImportField::Question);
    if question.is_empty() {
        problems.push(RowProblem::MissingQuestion);
    }

    let option_a = cell(row, mapping, ImportField::OptionA);
    let option_b = cell(row, mapping, ImportField::OptionB);
    if option_a.is_empty() || option_b.is_empty() {
        problems.push(RowProblem::MissingRequiredOptions);
    }

    let answer = cell(row, mapping, ImportField::CorrectAnswer);
    let letter = decode_answer(answer);
    if answer.is_empty() {
        problems.push(RowProblem::MissingAnswer);
    } else if letter.is_none() {
        problems.push(RowProblem::InvalidAnswer);
    }

    let points = match &mapping.points {
        PointsSource::Fixed(points) => Some(*points),
        PointsSource::Column(header) => parse_points(row.get(header)),
    };
    if points.is_none() {
        problems.push(RowProblem::InvalidPoints);
    }

    match (letter, points) {
        (Some(letter), Some(points)) if problems.is_empty() => Ok(ImportedQuestion {
            question_text: question.to_string(),
            options: [
                option_a.to_string(),
                option_b.to_string(),
                cell(row, mapping, ImportField::OptionC).to_string(),
                cell(row, mapping, ImportField::OptionD).to_string(),
            ],
            correct_index: letter as u8 - b'A',
            points,
            line: row.line,
        }),
        _ => Err(problems),
    }
}

/// Uppercase, drop everything but A-D, take the first letter left.
pub fn decode_answer(raw: &str) -> Option<char> {
    raw.chars()
        .flat_map(char::to_uppercase)
        .find(|c| matches!(c, 'A'..='D'))
}

fn parse_points(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|p| *p > 0)
}

/// Keep the first question for each `(question_text, correct_index)` pair.
///
/// Returns the survivors in input order and how many were dropped.
pub fn dedupe(questions: Vec<ImportedQuestion>) -> (Vec<ImportedQuestion>, usize) {
    let before = questions.len();
    let mut seen = HashSet::new();
    let unique: Vec<ImportedQuestion> = questions
        .into_iter()
        .filter(|q| seen.insert((q.question_text.trim().to_string(), q.correct_index)))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}
