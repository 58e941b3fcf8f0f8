use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of a weekly availability import: `mentor,day_of_week,start,end`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleRow {
    /// Mentor username.
    pub mentor: String,
    pub day_of_week: u8,
    pub start: String,
    pub end: String,
}

/// Reads availability rules from a CSV source.
///
/// Whitespace around fields is trimmed. Rows are deserialized lazily, so a
/// malformed row surfaces as an `Err` item without stopping the stream.
pub struct RuleReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RuleReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rules(self) -> impl Iterator<Item = Result<RuleRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "mentor, day_of_week, start, end\nasha, 1, 10:00, 12:00\nasha, 3, 14:00, 15:30";
        let rows: Vec<Result<RuleRow>> = RuleReader::new(data.as_bytes()).rules().collect();

        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.mentor, "asha");
        assert_eq!(first.day_of_week, 1);
        assert_eq!(first.end, "12:00");
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "mentor, day_of_week, start, end\nasha, monday, 10:00, 12:00\nasha, 2, 09:00, 10:00";
        let rows: Vec<Result<RuleRow>> = RuleReader::new(data.as_bytes()).rules().collect();

        assert!(rows[0].is_err());
        assert!(rows[1].is_ok());
    }
}
