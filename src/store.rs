use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::{BatchReport, RawChapter, TranslatedChapter};

const RAWS_DIR: &str = "raws";
const TRANS_DIR: &str = "trans";
const TABLES_DIR: &str = "tables";
const DICTS_DIR: &str = "dicts";
const REPORTS_DIR: &str = "reports";

/// Files produced by a run, laid out under one workspace root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub removed: usize,
    pub failed: usize,
}

impl ArtifactStore {
    /// Opens the store, creating the directory layout when missing.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = Self { root: root.into() };
        for dir in [RAWS_DIR, TRANS_DIR, TABLES_DIR, DICTS_DIR, REPORTS_DIR] {
            let path = store.root.join(dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("create store dir: {}", path.display()))?;
        }
        Ok(store)
    }

    pub fn raw_path(&self, abbr: &str, ordinal: usize) -> PathBuf {
        self.root.join(RAWS_DIR).join(format!("r{abbr}_{ordinal}.txt"))
    }

    /// Fetched page of a chapter whose content could not be extracted.
    pub fn page_path(&self, abbr: &str, ordinal: usize) -> PathBuf {
        self.root.join(RAWS_DIR).join(format!("r{abbr}_{ordinal}.html"))
    }

    pub fn translated_path(&self, abbr: &str, ordinal: usize) -> PathBuf {
        self.root.join(TRANS_DIR).join(format!("t{abbr}_{ordinal}.txt"))
    }

    pub fn table_path(&self, abbr: &str) -> PathBuf {
        self.root
            .join(TABLES_DIR)
            .join(format!("{}.table", abbr.to_lowercase()))
    }

    pub fn dict_path(&self, abbr: &str) -> PathBuf {
        self.root
            .join(DICTS_DIR)
            .join(format!("{}.dict", abbr.to_lowercase()))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn load_raw(&self, abbr: &str, ordinal: usize) -> anyhow::Result<Option<RawChapter>> {
        let path = self.raw_path(abbr, ordinal);
        Ok(read_computed(&path)?.and_then(|text| RawChapter::from_text(&text)))
    }

    pub fn save_raw(&self, abbr: &str, ordinal: usize, chapter: &RawChapter) -> anyhow::Result<()> {
        write_atomic(&self.raw_path(abbr, ordinal), &chapter.to_text())
    }

    /// Keeps a page for inspection; returns where it was written.
    pub fn save_page(&self, abbr: &str, ordinal: usize, html: &str) -> anyhow::Result<PathBuf> {
        let path = self.page_path(abbr, ordinal);
        write_atomic(&path, html)?;
        Ok(path)
    }

    pub fn load_translated(
        &self,
        abbr: &str,
        ordinal: usize,
    ) -> anyhow::Result<Option<TranslatedChapter>> {
        let path = self.translated_path(abbr, ordinal);
        Ok(read_computed(&path)?.and_then(|text| TranslatedChapter::from_text(&text)))
    }

    pub fn save_translated(
        &self,
        abbr: &str,
        ordinal: usize,
        chapter: &TranslatedChapter,
    ) -> anyhow::Result<()> {
        write_atomic(&self.translated_path(abbr, ordinal), &chapter.to_text())
    }

    /// Cached page table codes; blank lines are skipped.
    pub fn load_table(&self, abbr: &str) -> anyhow::Result<Option<Vec<String>>> {
        let Some(text) = read_computed(&self.table_path(abbr))? else {
            return Ok(None);
        };
        let codes = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        Ok((!codes.is_empty()).then_some(codes))
    }

    /// Writes the page table and marks it read-only so it is not edited by accident.
    pub fn save_table(&self, abbr: &str, codes: &[String]) -> anyhow::Result<()> {
        let path = self.table_path(abbr);
        if path.exists() {
            set_readonly(&path, false)?;
        }
        let mut text = codes.join("\n");
        text.push('\n');
        write_atomic(&path, &text)?;
        set_readonly(&path, true)
    }

    pub fn save_report(&self, report: &BatchReport, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.reports_dir().join(format!(
                "{}_{}.json",
                report.series,
                report.started_at.format("%Y%m%dT%H%M%SZ")
            )),
        };
        let json = serde_json::to_string_pretty(report).context("serialize batch report")?;
        write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Removes downloaded, translated and report files. Tables and dictionaries stay.
    pub fn clean(&self) -> anyhow::Result<CleanSummary> {
        let mut summary = CleanSummary::default();
        for dir in [RAWS_DIR, TRANS_DIR, REPORTS_DIR] {
            let dir = self.root.join(dir);
            if !dir.exists() {
                continue;
            }
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("read store dir: {}", dir.display()))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match std::fs::remove_file(&path) {
                    Ok(()) => summary.removed += 1,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "failed to remove artifact");
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }
}

/// An artifact counts as computed once it exists with non-zero size.
pub fn is_computed(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn read_computed(path: &Path) -> anyhow::Result<Option<String>> {
    if !is_computed(path) {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read artifact: {}", path.display()))?;
    Ok(Some(text))
}

/// Writes through a temp file in the same directory so readers never see a partial artifact.
pub fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create output dir: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write output: {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("flush output: {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("persist output: {}", path.display()))?;
    Ok(())
}

#[allow(clippy::permissions_set_readonly_false)]
fn set_readonly(path: &Path, readonly: bool) -> anyhow::Result<()> {
    let mut perms = std::fs::metadata(path)
        .with_context(|| format!("stat: {}", path.display()))?
        .permissions();
    perms.set_readonly(readonly);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("set permissions: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_naming_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(store.raw_path("MT", 7).ends_with("raws/rMT_7.txt"));
        assert!(store.translated_path("MT", 7).ends_with("trans/tMT_7.txt"));
        assert!(store.table_path("WX").ends_with("tables/wx.table"));
        assert!(store.dict_path("WX").ends_with("dicts/wx.dict"));
        assert!(dir.path().join("reports").is_dir());
    }

    #[test]
    fn empty_file_is_not_computed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let path = store.translated_path("MT", 1);
        std::fs::write(&path, "").unwrap();
        assert!(!is_computed(&path));
        assert_eq!(store.load_translated("MT", 1).unwrap(), None);

        let chapter = TranslatedChapter {
            title: "T".to_owned(),
            lines: vec!["x".to_owned()],
        };
        store.save_translated("MT", 1, &chapter).unwrap();
        assert!(is_computed(&path));
        assert_eq!(store.load_translated("MT", 1).unwrap(), Some(chapter));
    }

    #[test]
    fn table_is_read_only_and_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let codes = vec!["a".to_owned(), "b".to_owned()];
        store.save_table("WX", &codes).unwrap();

        let path = store.table_path("WX");
        assert!(std::fs::metadata(&path).unwrap().permissions().readonly());
        assert_eq!(store.load_table("WX").unwrap(), Some(codes));

        let codes = vec!["c".to_owned()];
        store.save_table("WX", &codes).unwrap();
        assert_eq!(store.load_table("WX").unwrap(), Some(codes));
        assert!(std::fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[test]
    fn table_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        std::fs::write(store.table_path("WX"), "a\n\n b \n\n").unwrap();
        assert_eq!(
            store.load_table("WX").unwrap(),
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
    }

    #[test]
    fn clean_keeps_tables_and_dicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        std::fs::write(store.raw_path("MT", 1), "t\n").unwrap();
        std::fs::write(store.translated_path("MT", 1), "t\n").unwrap();
        std::fs::write(store.dict_path("MT"), "a --> b\n").unwrap();
        store.save_table("WX", &["a".to_owned()]).unwrap();

        let summary = store.clean().unwrap();
        assert_eq!(summary, CleanSummary { removed: 2, failed: 0 });
        assert!(store.dict_path("MT").exists());
        assert!(store.table_path("WX").exists());
    }
}
