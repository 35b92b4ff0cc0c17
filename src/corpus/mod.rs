//! The position corpus: a flat UTF-8 file with one descriptor per line.
//!
//! `CorpusWriter` is the sink the builder streams into; `CorpusReader` is the
//! source the comparator iterates. Blank lines are skipped on read, so a
//! trailing newline never turns into an empty descriptor.

mod builder;
mod pgn;

pub use builder::{BuildObserver, BuildOptions, BuildSummary, CorpusBuilder, EnPassantRendering};
pub use pgn::{GameRecord, PgnReader, RawGame};

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::error::CorpusError;
use crate::types::PositionDescriptor;

/// One descriptor plus the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub line: usize,
    pub descriptor: PositionDescriptor,
}

/// Iterator over corpus entries in file order.
pub struct CorpusReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> CorpusReader<R> {
    pub fn new(reader: R) -> Self {
        CorpusReader {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl CorpusReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(CorpusReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for CorpusReader<R> {
    type Item = Result<CorpusEntry, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(CorpusError::Io(e))),
            };
            self.line_no += 1;
            if let Some(descriptor) = PositionDescriptor::new(&line) {
                return Some(Ok(CorpusEntry {
                    line: self.line_no,
                    descriptor,
                }));
            }
            log::trace!("corpus line {} is blank, skipping", self.line_no);
        }
    }
}

/// Append-only sink writing one descriptor per line.
pub struct CorpusWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> CorpusWriter<W> {
    pub fn new(out: W) -> Self {
        CorpusWriter { out, written: 0 }
    }

    pub fn write(&mut self, descriptor: &PositionDescriptor) -> io::Result<()> {
        writeln!(self.out, "{descriptor}")?;
        self.written += 1;
        Ok(())
    }

    /// Number of descriptors written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl CorpusWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(CorpusWriter::new(BufWriter::new(File::create(path)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_skips_blank_and_trailing_lines() {
        let text = "8/8/8/8/8/8/8/K6k w - - 0 1\n\n  8/8/8/8/8/8/8/k6K b - - 0 1  \n\n";
        let entries: Vec<CorpusEntry> = CorpusReader::new(text.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[1].line, 3);
        assert_eq!(entries[1].descriptor.as_str(), "8/8/8/8/8/8/8/k6K b - - 0 1");
    }

    #[test]
    fn writer_emits_one_line_per_descriptor() {
        let mut writer = CorpusWriter::new(Vec::new());
        writer.write(&PositionDescriptor::startpos()).unwrap();
        writer
            .write(&PositionDescriptor::new("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap())
            .unwrap();
        assert_eq!(writer.written(), 2);
        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            format!("{}\n8/8/8/8/8/8/8/K6k w - - 0 1\n", PositionDescriptor::STARTPOS)
        );
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        assert_eq!(CorpusReader::new(&b""[..]).count(), 0);
        assert_eq!(CorpusReader::new(&b"\n"[..]).count(), 0);
    }
}
