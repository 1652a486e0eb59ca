//! JSON persistence for [`VectorIndex`].
//!
//! The file records its own format tag, version, model, and dimension so a
//! load can tell a damaged or foreign file from a valid index.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::store::{IndexEntry, VectorIndex};
use crate::{Error, Result};

const FORMAT: &str = "docqa-index";
const VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format: &'a str,
    version: u32,
    model: &'a str,
    dimension: usize,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    format: String,
    version: u32,
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Write the index to `path`, replacing any previous file atomically.
    ///
    /// The data goes to a temporary file next to `path` that is renamed over
    /// it once complete, so readers never observe a half-written index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(
                &mut writer,
                &IndexFileRef {
                    format: FORMAT,
                    version: VERSION,
                    model: self.model(),
                    dimension: self.dimension(),
                    entries: self.entries(),
                },
            )
            .map_err(io::Error::from)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %path.display(), entries = self.len(), "saved index");
        Ok(())
    }

    /// Read an index written by [`VectorIndex::save`].
    ///
    /// A missing file is [`Error::IndexNotFound`]; anything unreadable,
    /// foreign, or inconsistent is [`Error::IndexCorrupt`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::IndexNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let data: IndexFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::corrupt(path, e.to_string()))?;

        if data.format != FORMAT {
            return Err(Error::corrupt(
                path,
                format!("unexpected format tag {:?}", data.format),
            ));
        }
        if data.version != VERSION {
            return Err(Error::corrupt(
                path,
                format!("unsupported version {}", data.version),
            ));
        }
        if data.dimension == 0 {
            return Err(Error::corrupt(path, "dimension is 0"));
        }
        if data.entries.is_empty() {
            return Err(Error::corrupt(path, "index has no entries"));
        }
        for (id, entry) in data.entries.iter().enumerate() {
            if entry.vector.len() != data.dimension {
                return Err(Error::corrupt(
                    path,
                    format!(
                        "entry {id} has dimension {}, expected {}",
                        entry.vector.len(),
                        data.dimension
                    ),
                ));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::corrupt(path, format!("entry {id} is not finite")));
            }
        }

        tracing::debug!(path = %path.display(), entries = data.entries.len(), "loaded index");
        Ok(VectorIndex::from_parts(data.model, data.dimension, data.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> VectorIndex {
        VectorIndex::build(
            "test-model",
            vec![
                ("north".to_string(), vec![0.0, 1.0, 0.0]),
                ("east".to_string(), vec![1.0, 0.0, 0.0]),
                ("north east".to_string(), vec![0.7, 0.7, 0.1]),
                ("up".to_string(), vec![0.1, 0.2, 0.9]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_search() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let index = sample();
        index.save(&path).unwrap();
        let loaded = VectorIndex::load(&path).unwrap();

        assert_eq!(loaded.model(), "test-model");
        assert_eq!(loaded.len(), index.len());
        for query in [[1.0, 0.0, 0.0], [0.3, 0.9, 0.0], [0.0, 0.0, 1.0], [-1.0, 0.5, 0.2]] {
            let before = index.search(&query, 3).unwrap();
            let after = loaded.search(&query, 3).unwrap();

            let ranked = |r: &[crate::store::SearchResult]| -> Vec<(usize, String)> {
                r.iter().map(|r| (r.id, r.text.clone())).collect()
            };
            assert_eq!(ranked(&after), ranked(&before));
            for (a, b) in after.iter().zip(&before) {
                assert!((a.score - b.score).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_save_replaces_previous_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");

        sample().save(&path).unwrap();
        let replacement =
            VectorIndex::build("test-model", vec![("only".to_string(), vec![1.0, 0.0])]).unwrap();
        replacement.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.dimension(), 2);
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"\x00\x01 not json").unwrap();

        assert!(matches!(
            VectorIndex::load(&path),
            Err(Error::IndexCorrupt { .. })
        ));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        sample().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(
            VectorIndex::load(&path),
            Err(Error::IndexCorrupt { .. })
        ));
    }

    #[test]
    fn test_foreign_and_inconsistent_files_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let cases = [
            r#"{"format":"other-index","version":1,"model":"m","dimension":2,"entries":[{"text":"a","vector":[1.0,0.0]}]}"#,
            r#"{"format":"docqa-index","version":9,"model":"m","dimension":2,"entries":[{"text":"a","vector":[1.0,0.0]}]}"#,
            r#"{"format":"docqa-index","version":1,"model":"m","dimension":3,"entries":[{"text":"a","vector":[1.0,0.0]}]}"#,
            r#"{"format":"docqa-index","version":1,"model":"m","dimension":2,"entries":[]}"#,
            r#"{"format":"docqa-index","version":1,"model":"m","dimension":0,"entries":[{"text":"a","vector":[]}]}"#,
            r#"{"hello":"world"}"#,
        ];

        for case in cases {
            std::fs::write(&path, case).unwrap();
            let err = VectorIndex::load(&path).unwrap_err();
            assert!(matches!(err, Error::IndexCorrupt { .. }), "{case}: {err}");
        }
    }
}
