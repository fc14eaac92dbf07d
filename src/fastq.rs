use needletail::errors::{ParseError, ParseErrorKind};
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};

use flate2::{write::GzEncoder, Compression};

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::*;
use crate::read::*;

/// Declared format of a sequencing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Fastq,
    Fasta,
}

impl Format {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Format::Fastq => &["fastq", "fq"],
            Format::Fasta => &["fasta", "fa", "fna", "fas"],
        }
    }

    /// Whether a file name ends in a raw or gzip-compressed extension of this format.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.strip_suffix(".gz").unwrap_or(name);
        self.extensions()
            .iter()
            .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{ext}")))
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::Fastq
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::Fastq => write!(f, "fastq"),
            Format::Fasta => write!(f, "fasta"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Origin {
    File(String),
    Bytes,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::File(file) => write!(f, "file \"{}\"", file),
            Origin::Bytes => write!(f, "bytes"),
        }
    }
}

/// Single-pass stream of reads parsed from a FASTQ or FASTA source.
pub struct Records<'reader> {
    reader: Option<Box<dyn FastxReader + 'reader>>,
    origin: Origin,
    idx: usize,
}

impl<'reader> Records<'reader> {
    fn new(
        reader: std::result::Result<Box<dyn FastxReader + 'reader>, ParseError>,
        origin: Origin,
    ) -> Result<Self> {
        let reader = match reader {
            Ok(reader) => Some(reader),
            // an empty input is an empty collection, not an error
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => None,
            Err(e) => {
                return Err(match &origin {
                    Origin::File(file) => Error::file_io(file, e),
                    Origin::Bytes => Error::BytesIo(Box::new(e)),
                })
            }
        };

        Ok(Self {
            reader,
            origin,
            idx: 0,
        })
    }
}

impl<'reader> Iterator for Records<'reader> {
    type Item = Result<Read>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.reader.as_mut()?.next()?;
        let idx = self.idx;
        self.idx += 1;

        Some(
            record
                .map(|r| match r.qual() {
                    Some(qual) => Read::from_fastq(r.id(), &r.seq(), qual),
                    None => Read::from_fasta(r.id(), &r.seq()),
                })
                .map_err(|e| Error::ParseRecord {
                    origin: self.origin.clone(),
                    idx,
                    source: Box::new(e),
                }),
        )
    }
}

/// Stream reads from a plain or gzip-compressed file of the declared format.
///
/// The file name must end in one of the format's extensions, optionally followed by `.gz`.
pub fn read_records(file: impl AsRef<Path>, format: Format) -> Result<Records<'static>> {
    let file = file.as_ref();
    if !format.accepts(file) {
        return Err(Error::UnsupportedFormat {
            file: file.display().to_string(),
            format,
        });
    }

    Records::new(
        parse_fastx_file(file),
        Origin::File(file.display().to_string()),
    )
}

/// Stream reads from an in-memory FASTQ or FASTA buffer.
pub fn read_bytes(bytes: &[u8]) -> Result<Records<'_>> {
    Records::new(parse_fastx_reader(bytes), Origin::Bytes)
}

/// Read a whole file into memory.
pub fn read_all(file: impl AsRef<Path>, format: Format) -> Result<Vec<Read>> {
    read_records(file, format)?.collect()
}

fn create_writer(file: &Path) -> Result<Box<dyn Write>> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
    }
    let f = File::create(file).map_err(|e| Error::file_io(file, e))?;

    let writer: Box<dyn Write> = if file.extension().map_or(false, |e| e == "gz") {
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(f))
    };
    Ok(writer)
}

pub fn write_fastq_record(writer: &mut dyn Write, read: &Read) -> std::io::Result<()> {
    let Some(qual) = read.encoded_qual() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("read \"{}\" has no quality scores", utf8(read.id())),
        ));
    };
    writer.write_all(b"@")?;
    writer.write_all(read.header())?;
    writer.write_all(b"\n")?;
    writer.write_all(read.seq())?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&qual)?;
    writer.write_all(b"\n")
}

pub fn write_fasta_record(writer: &mut dyn Write, read: &Read) -> std::io::Result<()> {
    writer.write_all(b">")?;
    writer.write_all(read.header())?;
    writer.write_all(b"\n")?;
    writer.write_all(read.seq())?;
    writer.write_all(b"\n")
}

/// Write reads as FASTQ, gzip-compressed if the file name ends in `.gz`.
pub fn write_fastq<'a>(
    file: impl AsRef<Path>,
    reads: impl IntoIterator<Item = &'a Read>,
) -> Result<usize> {
    write_with(file.as_ref(), reads, write_fastq_record)
}

/// Write reads as FASTA, gzip-compressed if the file name ends in `.gz`.
pub fn write_fasta<'a>(
    file: impl AsRef<Path>,
    reads: impl IntoIterator<Item = &'a Read>,
) -> Result<usize> {
    write_with(file.as_ref(), reads, write_fasta_record)
}

fn write_with<'a>(
    file: &Path,
    reads: impl IntoIterator<Item = &'a Read>,
    write_record: fn(&mut dyn Write, &Read) -> std::io::Result<()>,
) -> Result<usize> {
    let mut writer = create_writer(file)?;
    let mut n = 0;

    for read in reads {
        write_record(&mut *writer, read).map_err(|e| Error::file_io(file, e))?;
        n += 1;
    }

    writer.flush().map_err(|e| Error::file_io(file, e))?;
    Ok(n)
}
