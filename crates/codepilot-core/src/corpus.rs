//! JSON Lines persistence for the corpus.
//!
//! One [`ChunkRecord`] per line, in corpus order. Line `i` of the file is
//! vector `i` of the index persisted next to it, so the order here is
//! load-bearing.

use std::io::{BufRead, Write};

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::index::CorpusDigest;
use crate::models::ChunkRecord;

/// Write `records` to `out`, one JSON object per line.
pub fn write_jsonl<W: Write>(mut out: W, records: &[ChunkRecord]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Read records written by [`write_jsonl`]. Blank lines are skipped.
pub fn read_jsonl<R: BufRead>(input: R) -> Result<Vec<ChunkRecord>> {
    let mut records = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// SHA-256 over the JSON Lines encoding of `records`.
///
/// Equal for a corpus before [`write_jsonl`] and after [`read_jsonl`].
pub fn corpus_digest(records: &[ChunkRecord]) -> Result<CorpusDigest> {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(serde_json::to_vec(record)?);
        hasher.update(b"\n");
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn record(path: &str, start: usize, text: &str) -> ChunkRecord {
        ChunkRecord {
            repo: "demo".to_string(),
            path: path.to_string(),
            lang: "python".to_string(),
            start_line: start,
            end_line: start + 1,
            text: text.to_string(),
            hash: crate::dedup::content_hash(text),
            preview: text.to_string(),
        }
    }

    #[test]
    fn test_preserves_order_and_content() {
        let records = vec![
            record("b.py", 1, "line one\nline \"two\"\n"),
            record("a.py", 5, "ünïcode\ttabs\r\n"),
            record("a.py", 1, ""),
        ];
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &records).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("\"path\":\"b.py\""));

        let loaded = read_jsonl(buf.as_slice()).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_rejects_malformed_line() {
        let input = b"{\"repo\":\"x\"}\n";
        let err = read_jsonl(&input[..]).unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }

    #[test]
    fn test_skips_blank_lines() {
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &[record("a.py", 1, "x")]).unwrap();
        buf.extend_from_slice(b"\n\n");
        assert_eq!(read_jsonl(buf.as_slice()).unwrap().len(), 1);
    }

    #[test]
    fn test_digest_survives_round_trip() {
        let records = vec![record("a.py", 1, "fn main() {}\n"), record("b.py", 3, "é\n")];
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &records).unwrap();
        let loaded = read_jsonl(buf.as_slice()).unwrap();
        assert_eq!(corpus_digest(&loaded).unwrap(), corpus_digest(&records).unwrap());
    }

    #[test]
    fn test_digest_depends_on_content_and_order() {
        let a = record("a.py", 1, "one\n");
        let b = record("b.py", 1, "two\n");
        let ab = corpus_digest(&[a.clone(), b.clone()]).unwrap();
        assert_ne!(ab, corpus_digest(&[b, a.clone()]).unwrap());
        assert_ne!(ab, corpus_digest(&[a]).unwrap());
    }
}
