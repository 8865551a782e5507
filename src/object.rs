//! The indirect-object store and the low-level file serializer.
//!
//! Objects are collected in assignment order; ids are 1-based, contiguous,
//! and never reused, so assignment order is also write order. Most entries
//! carry their finished bytes. Font-subset entries are deferred: their ids
//! are fixed when the subset is created but their bodies are produced during
//! the single write pass, once the subset is complete. The serializer owns
//! the output sink, records the byte offset of every object it writes, and
//! emits the cross-reference table and trailer from those offsets.

use std::fmt::Write as FmtWrite;
use std::io::Write;

use crate::error::Result;
use crate::types::FontId;

/// One slot in the object table.
#[derive(Debug, Clone)]
pub(crate) enum ObjectEntry {
    /// A finished dictionary, optionally followed by a stream.
    Full {
        dictionary: String,
        stream: Option<Vec<u8>>,
    },
    /// Compressed subset font program, produced at write time.
    SubsetFontData { font: FontId, subset: usize },
    /// FontDescriptor for a subset.
    SubsetFontDescriptor {
        font: FontId,
        subset: usize,
        data_obj: i32,
    },
    /// ToUnicode CMap for a subset.
    SubsetCmap { font: FontId, subset: usize },
    /// The font dictionary itself.
    SubsetFont {
        font: FontId,
        subset: usize,
        descriptor_obj: i32,
        cmap_obj: i32,
    },
    /// An annotation; its destination needs page object numbers, which are
    /// only known once the page tree has been laid out.
    Annotation { index: usize },
}

/// Append-only table of indirect objects.
#[derive(Debug, Default)]
pub(crate) struct ObjectStore {
    entries: Vec<ObjectEntry>,
}

impl ObjectStore {
    pub fn new() -> Self {
        ObjectStore::default()
    }

    /// Add an entry and return its 1-based object number.
    pub fn add(&mut self, entry: ObjectEntry) -> i32 {
        self.entries.push(entry);
        self.entries.len() as i32
    }

    /// Shorthand for a dictionary-only object.
    pub fn add_dict(&mut self, dictionary: String) -> i32 {
        self.add(ObjectEntry::Full {
            dictionary,
            stream: None,
        })
    }

    /// Shorthand for a dictionary + stream object.
    pub fn add_stream(&mut self, dictionary: String, stream: Vec<u8>) -> i32 {
        self.add(ObjectEntry::Full {
            dictionary,
            stream: Some(stream),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The object number the next `add` call will return.
    pub fn next_object_number(&self) -> i32 {
        self.entries.len() as i32 + 1
    }

    pub fn entries(&self) -> &[ObjectEntry] {
        &self.entries
    }
}

const PDF_HEADER: &[u8] = b"%PDF-1.7\n%\xe5\xf6\xc4\xd6\n";

/// Writes the physical file: header, object envelopes, xref, trailer.
///
/// Tracks the byte position itself so offsets are exact regardless of the
/// sink; every write is checked and any failure aborts the whole operation.
pub(crate) struct Serializer<W: Write> {
    sink: W,
    position: u64,
    offsets: Vec<u64>,
}

impl<W: Write> Serializer<W> {
    pub fn new(sink: W) -> Self {
        Serializer {
            sink,
            position: 0,
            offsets: Vec::new(),
        }
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.sink.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.write_bytes(PDF_HEADER)
    }

    /// Write one `N 0 obj .. endobj` envelope, recording its offset.
    ///
    /// Object numbers must arrive in 1, 2, 3, … order; the offset table is
    /// keyed by that invariant.
    pub fn write_object(
        &mut self,
        object_number: i32,
        dictionary: &str,
        stream: Option<&[u8]>,
    ) -> Result<()> {
        debug_assert_eq!(object_number as usize, self.offsets.len() + 1);
        self.offsets.push(self.position);

        let mut buf = Vec::with_capacity(dictionary.len() + 64);
        let _ = write!(buf, "{} 0 obj\n", object_number);
        buf.extend_from_slice(dictionary.as_bytes());
        if !buf.ends_with(b"\n") {
            buf.push(b'\n');
        }
        if let Some(data) = stream {
            buf.extend_from_slice(b"stream\n");
            buf.extend_from_slice(data);
            if !buf.ends_with(b"\n") {
                buf.push(b'\n');
            }
            buf.extend_from_slice(b"endstream\n");
        }
        buf.extend_from_slice(b"endobj\n");
        self.write_bytes(&buf)
    }

    /// Emit the xref table and trailer. `root` must be the last object
    /// written and `info` the first.
    pub fn write_xref_and_trailer(&mut self, root: i32, info: i32) -> Result<()> {
        let xref_offset = self.position;
        let mut buf = String::new();
        let _ = write!(buf, "xref\n0 {}\n", self.offsets.len() + 1);
        // Entry 0 is the head of the free list. Trailing space before the
        // newline is significant: each line is exactly 20 bytes.
        buf.push_str("0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = write!(buf, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            buf,
            "trailer\n<<\n  /Size {}\n  /Root {} 0 R\n  /Info {} 0 R\n>>\nstartxref\n{}\n%%EOF\n",
            self.offsets.len() + 1,
            root,
            info,
            xref_offset
        );
        self.write_bytes(buf.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_numbers_are_one_based_and_contiguous() {
        let mut store = ObjectStore::new();
        assert_eq!(store.add_dict("<< >>".into()), 1);
        assert_eq!(store.add_dict("<< >>".into()), 2);
        assert_eq!(store.next_object_number(), 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_envelope_format() {
        let mut ser = Serializer::new(Vec::new());
        ser.write_header().unwrap();
        ser.write_object(1, "<< /Type /Catalog >>", None).unwrap();
        let out = ser.into_inner();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("1 0 obj\n<< /Type /Catalog >>\nendobj\n"));
    }

    #[test]
    fn test_stream_envelope() {
        let mut ser = Serializer::new(Vec::new());
        ser.write_object(1, "<< /Length 3 >>", Some(b"abc")).unwrap();
        let out = ser.into_inner();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains(">>\nstream\nabc\nendstream\nendobj\n"));
    }

    // Offset tests skip the header: its binary marker bytes would make the
    // lossy text conversion disagree with true byte positions.

    #[test]
    fn test_xref_offsets_match_object_positions() {
        let mut ser = Serializer::new(Vec::new());
        ser.write_object(1, "<< /A 1 >>", None).unwrap();
        ser.write_object(2, "<< /B 2 >>", None).unwrap();
        ser.write_xref_and_trailer(2, 1).unwrap();
        let out = ser.into_inner();
        let text = String::from_utf8(out).unwrap();

        // Each xref entry must point at the "N 0 obj" keyword.
        let xref_at = text.find("xref\n0 3\n").expect("xref header");
        let entries: Vec<&str> = text[xref_at..].lines().skip(2).take(2).collect();
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", i + 1);
            assert_eq!(&text[offset..offset + expected.len()], expected);
        }
        // Entry 0 is the free-list head.
        assert!(text.contains("0000000000 65535 f \n"));
    }

    #[test]
    fn test_xref_lines_are_twenty_bytes() {
        let mut ser = Serializer::new(Vec::new());
        ser.write_object(1, "<< >>", None).unwrap();
        ser.write_xref_and_trailer(1, 1).unwrap();
        let out = ser.into_inner();
        let text = String::from_utf8(out).unwrap();
        let xref_at = text.find("xref\n").unwrap();
        for line in text[xref_at..].lines().skip(2).take(1) {
            // +1 for the newline stripped by lines()
            assert_eq!(line.len() + 1, 20);
        }
    }

    #[test]
    fn test_startxref_points_at_xref_keyword() {
        let mut ser = Serializer::new(Vec::new());
        ser.write_object(1, "<< >>", None).unwrap();
        ser.write_xref_and_trailer(1, 1).unwrap();
        let out = ser.into_inner();
        let text = String::from_utf8(out).unwrap();
        let startxref = text.find("startxref\n").unwrap();
        let offset: usize = text[startxref + 10..]
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(&text[offset..offset + 4], "xref");
    }
}
