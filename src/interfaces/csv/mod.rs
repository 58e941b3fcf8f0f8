pub mod rule_reader;
pub mod slot_writer;
