//! WAL test suite

mod entry_tests;
mod reader_tests;
mod writer_tests;
