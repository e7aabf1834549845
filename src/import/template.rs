//! Downloadable CSV template matching the default column patterns.

use std::io;

pub const TEMPLATE_FILE_NAME: &str = "template_soal_ujian.csv";

const TEMPLATE_HEADERS: [&str; 7] = [
    "Pertanyaan",
    "Opsi A",
    "Opsi B",
    "Opsi C",
    "Opsi D",
    "Jawaban Benar",
    "Poin",
];

const TEMPLATE_ROWS: [[&str; 7]; 3] = [
    ["Apa ibukota Indonesia?", "Jakarta", "Surabaya", "Bandung", "Medan", "A", "5"],
    ["Berapa hasil dari 2 + 2?", "3", "4", "5", "6", "B", "5"],
    [
        "Planet terdekat dengan matahari adalah?",
        "Venus",
        "Merkurius",
        "Bumi",
        "Mars",
        "B",
        "5",
    ],
];

/// Render the template; the writer takes care of quoting.
pub fn template_csv() -> io::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TEMPLATE_HEADERS)?;
    for row in TEMPLATE_ROWS {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|err| err.into_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{KeywordStrategy, MappingStrategy, decode, validate_rows};

    #[test]
    fn template_imports_cleanly_with_suggested_mapping() {
        let bytes = template_csv().unwrap();
        let table = decode(TEMPLATE_FILE_NAME, &bytes).unwrap();
        let mapping = KeywordStrategy::builtin().suggest(&table.headers);
        mapping.check(&table).unwrap();

        let report = validate_rows(&table, &mapping);
        assert!(report.issues.is_empty());
        assert_eq!(report.accepted.len(), 3);
        assert_eq!(report.accepted[1].correct_index, 1);
    }
}
