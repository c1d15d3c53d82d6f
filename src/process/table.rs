use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use super::utils::normalize;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A downloaded CSV held in memory. Cells stay as text, so codes with leading
/// zeros survive untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTable {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl ProcessedTable {
    /// Parse a CSV body whose first record is the header row.
    ///
    /// Short rows are padded with empty cells; rows wider than the header
    /// are an error.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = rdr
            .headers()
            .context("reading CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            bail!("CSV has no header row");
        }

        let width = headers.len();
        let rows = rdr
            .records()
            .enumerate()
            .map(|(i, rec)| {
                let mut rec = rec.with_context(|| format!("parsing CSV record {}", i + 1))?;
                if rec.len() > width {
                    bail!(
                        "CSV record {} has {} fields, but the header has {}",
                        i + 1,
                        rec.len(),
                        width
                    );
                }
                while rec.len() < width {
                    rec.push_field("");
                }
                Ok(rec)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { headers, rows })
    }

    /// Rename every header through [`normalize`].
    pub fn normalize_headers(&mut self) {
        for h in &mut self.headers {
            *h = normalize(h);
        }
    }

    /// Write the whole table to `path`, replacing whatever was there.
    /// Content goes to a sibling temp file first and is renamed into place.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        {
            let mut wtr = WriterBuilder::new()
                .terminator(Terminator::Any(b'\n'))
                .from_writer(&mut tmp);
            wtr.write_record(&self.headers)
                .context("writing CSV header row")?;
            for row in &self.rows {
                wtr.write_record(row).context("writing CSV record")?;
            }
            wtr.flush().context("flushing CSV writer")?;
        }
        tmp.flush()?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("renaming temp file to {}", path.display()))?;
        Ok(())
    }
}
