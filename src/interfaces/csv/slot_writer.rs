use crate::domain::clock::TimeRange;
use crate::error::Result;
use std::io::Write;

/// Writes free slots as `start,end` rows.
pub struct SlotWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SlotWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_slots(&mut self, slots: &[TimeRange]) -> Result<()> {
        // An empty schedule still gets its header.
        if slots.is_empty() {
            self.writer.write_record(["start", "end"])?;
        }
        for slot in slots {
            self.writer.serialize(slot)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::parse_clock;

    #[test]
    fn test_write_slots() {
        let slots = vec![
            TimeRange::new(parse_clock("10:00").unwrap(), parse_clock("11:00").unwrap()).unwrap(),
            TimeRange::new(parse_clock("11:00").unwrap(), parse_clock("12:00").unwrap()).unwrap(),
        ];
        let mut out = Vec::new();
        SlotWriter::new(&mut out).write_slots(&slots).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "start,end\n10:00,11:00\n11:00,12:00\n"
        );
    }

    #[test]
    fn test_empty_schedule_has_header() {
        let mut out = Vec::new();
        SlotWriter::new(&mut out).write_slots(&[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "start,end\n");
    }
}
