//! On-disk layout of a built index.
//!
//! ```text
//! <index.dir>/
//!   chunks.jsonl   one ChunkRecord per line, corpus order
//!   index.bin      FlatIndex blob, vector i = line i
//! ```
//!
//! Both files are written to a temporary name and renamed into place, the
//! index last. The index header carries the digest of the corpus it was
//! built with, so if a save stops between the two renames the new corpus
//! is rejected as [`IndexCorrupt`](codepilot_core::CoreError::IndexCorrupt)
//! on load instead of being served against the previous vectors.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use codepilot_core::corpus::{corpus_digest, read_jsonl, write_jsonl};
use codepilot_core::index::{FlatIndex, VectorIndex};
use codepilot_core::models::ChunkRecord;
use codepilot_core::Result;

pub const CHUNKS_FILE: &str = "chunks.jsonl";
pub const INDEX_FILE: &str = "index.bin";

/// Write `corpus` and `index` under `dir`, creating it if needed.
pub fn save(dir: &Path, corpus: &[ChunkRecord], index: &dyn VectorIndex) -> Result<()> {
    fs::create_dir_all(dir)?;
    let digest = corpus_digest(corpus)?;

    let chunks_tmp = tmp_path(dir, CHUNKS_FILE);
    write_jsonl(BufWriter::new(File::create(&chunks_tmp)?), corpus)?;

    let index_tmp = tmp_path(dir, INDEX_FILE);
    fs::write(&index_tmp, index.persist(&digest))?;

    fs::rename(&chunks_tmp, dir.join(CHUNKS_FILE))?;
    fs::rename(&index_tmp, dir.join(INDEX_FILE))?;

    tracing::info!(dir = %dir.display(), chunks = corpus.len(), "saved index");
    Ok(())
}

/// Load a previously saved pair. Returns `Ok(None)` if either file is missing.
///
/// Fails with `IndexCorrupt` when `index.bin` was not written for the
/// records in `chunks.jsonl`.
pub fn load(dir: &Path) -> Result<Option<(Vec<ChunkRecord>, FlatIndex)>> {
    let chunks_path = dir.join(CHUNKS_FILE);
    let index_path = dir.join(INDEX_FILE);
    if !chunks_path.is_file() || !index_path.is_file() {
        return Ok(None);
    }

    let corpus = read_jsonl(BufReader::new(File::open(&chunks_path)?))?;
    let index = FlatIndex::load(&fs::read(&index_path)?, &corpus_digest(&corpus)?)?;
    Ok(Some((corpus, index)))
}

fn tmp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codepilot_core::CoreError;
    use tempfile::TempDir;

    fn record(path: &str) -> ChunkRecord {
        ChunkRecord {
            repo: "demo".to_string(),
            path: path.to_string(),
            lang: "python".to_string(),
            start_line: 1,
            end_line: 3,
            text: format!("# {}\n", path),
            hash: codepilot_core::dedup::content_hash(path),
            preview: format!("# {}", path),
        }
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("out");
        let corpus = vec![record("b.py"), record("a.py")];
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();

        save(&dir, &corpus, &index).unwrap();
        assert!(dir.join(CHUNKS_FILE).is_file());
        assert!(!tmp_path(&dir, INDEX_FILE).exists());

        let (loaded_corpus, loaded_index) = load(&dir).unwrap().unwrap();
        assert_eq!(loaded_corpus, corpus);
        assert_eq!(loaded_index.len(), 2);
        assert_eq!(loaded_index.dims(), 2);
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_index() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CHUNKS_FILE), "").unwrap();
        fs::write(tmp.path().join(INDEX_FILE), b"garbage").unwrap();
        assert!(matches!(load(tmp.path()), Err(CoreError::IndexCorrupt(_))));
    }

    #[test]
    fn test_load_rejects_corpus_from_another_save() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        save(dir, &[record("a.py"), record("b.py")], &index).unwrap();

        // State after a save that renamed the corpus but not the index.
        let newer = vec![record("c.py"), record("d.py")];
        write_jsonl(File::create(dir.join(CHUNKS_FILE)).unwrap(), &newer).unwrap();

        let err = load(dir).unwrap_err();
        assert!(matches!(err, CoreError::IndexCorrupt(_)));
    }

    #[test]
    fn test_resave_replaces_both_files() {
        let tmp = TempDir::new().unwrap();
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        save(tmp.path(), &[record("a.py"), record("b.py")], &index).unwrap();
        let newer = vec![record("c.py"), record("d.py")];
        save(tmp.path(), &newer, &index).unwrap();

        let (corpus, _) = load(tmp.path()).unwrap().unwrap();
        assert_eq!(corpus, newer);
    }
}
