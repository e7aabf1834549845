//! Binding source headers to the logical import fields.

use super::{DEFAULT_POINTS, DecodedTable, ImportError, ImportResult};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportField {
    Question,
    OptionA,
    OptionB,
    OptionC,
    OptionD,
    CorrectAnswer,
    Points,
}

impl ImportField {
    pub const ALL: [ImportField; 7] = [
        ImportField::Question,
        ImportField::OptionA,
        ImportField::OptionB,
        ImportField::OptionC,
        ImportField::OptionD,
        ImportField::CorrectAnswer,
        ImportField::Points,
    ];
}

impl fmt::Display for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportField::Question => "question",
            ImportField::OptionA => "option A",
            ImportField::OptionB => "option B",
            ImportField::OptionC => "option C",
            ImportField::OptionD => "option D",
            ImportField::CorrectAnswer => "correct answer",
            ImportField::Points => "points",
        };
        f.write_str(label)
    }
}

/// Where a question's points come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PointsSource {
    Fixed(u32),
    Column(String),
}

impl Default for PointsSource {
    fn default() -> Self {
        PointsSource::Fixed(DEFAULT_POINTS)
    }
}

/// Header chosen for each field. `None` means unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub question: Option<String>,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub points: PointsSource,
}

impl ColumnMapping {
    pub fn column(&self, field: ImportField) -> Option<&str> {
        match field {
            ImportField::Question => self.question.as_deref(),
            ImportField::OptionA => self.option_a.as_deref(),
            ImportField::OptionB => self.option_b.as_deref(),
            ImportField::OptionC => self.option_c.as_deref(),
            ImportField::OptionD => self.option_d.as_deref(),
            ImportField::CorrectAnswer => self.correct_answer.as_deref(),
            ImportField::Points => match &self.points {
                PointsSource::Column(header) => Some(header.as_str()),
                PointsSource::Fixed(_) => None,
            },
        }
    }

    pub fn set_column(&mut self, field: ImportField, header: Option<String>) {
        match field {
            ImportField::Question => self.question = header,
            ImportField::OptionA => self.option_a = header,
            ImportField::OptionB => self.option_b = header,
            ImportField::OptionC => self.option_c = header,
            ImportField::OptionD => self.option_d = header,
            ImportField::CorrectAnswer => self.correct_answer = header,
            ImportField::Points => {
                self.points = header.map_or(PointsSource::default(), PointsSource::Column)
            }
        }
    }

    /// Headers of every mapped column, in field order.
    pub fn mapped_columns(&self) -> Vec<&str> {
        ImportField::ALL
            .iter()
            .filter_map(|f| self.column(*f))
            .collect()
    }

    /// Reject mappings that cannot drive validation against `table`.
    pub fn check(&self, table: &DecodedTable) -> ImportResult<()> {
        for field in [
            ImportField::Question,
            ImportField::OptionA,
            ImportField::OptionB,
            ImportField::CorrectAnswer,
        ] {
            if self.column(field).is_none() {
                return Err(ImportError::MissingMapping(field));
            }
        }
        if let PointsSource::Fixed(0) = self.points {
            return Err(ImportError::MissingMapping(ImportField::Points));
        }
        for header in self.mapped_columns() {
            if !table.has_header(header) {
                return Err(ImportError::UnknownColumn(header.to_string()));
            }
        }
        Ok(())
    }
}

/// Produces an initial mapping from a file's headers.
pub trait MappingStrategy {
    fn suggest(&self, headers: &[String]) -> ColumnMapping;
}

/// Per-field header patterns, as written by Indonesian and English templates.
const BUILTIN_PATTERNS: &[(ImportField, &[&str])] = &[
    (ImportField::Question, &["pertanyaan", "question", "soal", "teks"]),
    (
        ImportField::OptionA,
        &["opsi a", "option a", "pilihan a", r"a\)", r"a\.", "^a$", r"a\s"],
    ),
    (
        ImportField::OptionB,
        &["opsi b", "option b", "pilihan b", r"b\)", r"b\.", "^b$", r"b\s"],
    ),
    (
        ImportField::OptionC,
        &["opsi c", "option c", "pilihan c", r"c\)", r"c\.", "^c$", r"c\s"],
    ),
    (
        ImportField::OptionD,
        &["opsi d", "option d", "pilihan d", r"d\)", r"d\.", "^d$", r"d\s"],
    ),
    (
        ImportField::CorrectAnswer,
        &[
            "jawaban benar",
            "correct answer",
            "jawaban",
            "answer",
            "kunci",
            "kunci jawaban",
        ],
    ),
    (ImportField::Points, &["poin", "points", "nilai", "score", "bobot"]),
];

/// Scores every header against case-insensitive patterns per field.
///
/// A header's score for a field is the length of the longest pattern it
/// matches; the best-scoring header wins, earlier headers win ties.
pub struct KeywordStrategy {
    patterns: Vec<(ImportField, Vec<Regex>)>,
}

impl KeywordStrategy {
    pub fn new(table: &[(ImportField, &[&str])]) -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(table.len());
        for (field, sources) in table {
            let compiled = sources
                .iter()
                .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
                .collect::<Result<Vec<_>, _>>()?;
            patterns.push((*field, compiled));
        }
        Ok(Self { patterns })
    }

    /// The built-in pattern table. Every entry is a valid regex; patterns
    /// that failed to compile would simply never match.
    pub fn builtin() -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .map(|(field, sources)| {
                let compiled = sources
                    .iter()
                    .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
                    .collect();
                (*field, compiled)
            })
            .collect();
        Self { patterns }
    }

    fn best_header(&self, regexes: &[Regex], headers: &[String]) -> Option<String> {
        let mut best: Option<(&String, usize)> = None;
        for header in headers {
            let lowered = header.to_lowercase();
            let score = regexes
                .iter()
                .filter(|re| re.is_match(&lowered))
                .map(|re| re.as_str().len())
                .max();
            if let Some(score) = score {
                if best.is_none_or(|(_, top)| score > top) {
                    best = Some((header, score));
                }
            }
        }
        best.map(|(header, _)| header.clone())
    }
}

impl Default for KeywordStrategy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MappingStrategy for KeywordStrategy {
    fn suggest(&self, headers: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        for (field, regexes) in &self.patterns {
            let header = self.best_header(regexes, headers);
            mapping.set_column(*field, header);
        }
        mapping
    }
}
