use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use argscan_core::FuncCallRecord;
use clap::ValueEnum;

pub const CSV_HEADER: [&str; 6] = ["No.", "File", "Address", "Caller", "Callee", "Argument"];

/// How records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated `Caller Callee Argument Filename Offset` lines.
    Text,
    /// Numbered rows under a `No.,File,Address,Caller,Callee,Argument` header.
    Csv,
    /// One JSON object per record.
    Json,
}

impl OutputFormat {
    /// CSV when writing to a file, text on stdout.
    pub fn default_for(out: Option<&Path>) -> Self {
        if out.is_some() {
            OutputFormat::Csv
        } else {
            OutputFormat::Text
        }
    }
}

/// Destination for record batches as they arrive from the scan.
pub trait RecordSink {
    fn write_batch(&mut self, records: &[FuncCallRecord]) -> Result<()>;

    /// Flush buffered output. Called once after the last batch.
    fn finish(&mut self) -> Result<()>;
}

pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RecordSink for TextSink<W> {
    fn write_batch(&mut self, records: &[FuncCallRecord]) -> Result<()> {
        for r in records {
            writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}",
                r.caller,
                r.callee,
                r.argument,
                r.file_path.display(),
                r.instruction_offset
            )?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    next_row: usize,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer, next_row: 1 })
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_batch(&mut self, records: &[FuncCallRecord]) -> Result<()> {
        for r in records {
            self.writer.write_record([
                self.next_row.to_string(),
                r.file_path.display().to_string(),
                format!("0x{}", r.instruction_offset),
                r.caller.clone(),
                r.callee.clone(),
                r.argument.clone(),
            ])?;
            self.next_row += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_batch(&mut self, records: &[FuncCallRecord]) -> Result<()> {
        for r in records {
            serde_json::to_writer(&mut self.out, r)?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Open the sink for `format`, writing to `out` or stdout.
pub fn open_sink(format: OutputFormat, out: Option<&Path>) -> Result<Box<dyn RecordSink>> {
    let writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    Ok(match format {
        OutputFormat::Text => Box::new(TextSink::new(writer)),
        OutputFormat::Csv => Box::new(CsvSink::new(writer)?),
        OutputFormat::Json => Box::new(JsonLinesSink::new(writer)),
    })
}
