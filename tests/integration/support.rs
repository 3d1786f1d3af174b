use rustmirror::cache::{CacheFiles, HashCache};
use rustmirror::mirror::{SyncError, SyncOptions, SyncSummary, Synchronizer};
use rustmirror::scanner::HashAlgorithm;
use rustmirror::target::{init_target, TargetLayout};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// An initialized source/target pair in scratch directories.
pub struct Fixture {
    pub source: TempDir,
    pub target: TempDir,
    pub algorithm: HashAlgorithm,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_algorithm(HashAlgorithm::Md5)
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        init_target(source.path(), target.path(), algorithm).unwrap();
        Self {
            source,
            target,
            algorithm,
        }
    }

    pub fn src(&self, relative: &str) -> PathBuf {
        self.source.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.src(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, relative: &str) {
        let path = self.src(relative);
        if path.is_dir() {
            fs::remove_dir_all(path).unwrap();
        } else {
            fs::remove_file(path).unwrap();
        }
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions::new(self.source.path(), self.target.path())
    }

    pub fn try_sync(&self) -> Result<SyncSummary, SyncError> {
        Synchronizer::new(self.options()).run()
    }

    pub fn sync(&self) -> SyncSummary {
        self.try_sync().unwrap()
    }

    pub fn sync_excluding(&self, patterns: &[&str]) -> SyncSummary {
        let exclude = patterns.iter().map(|p| p.to_string()).collect();
        Synchronizer::new(self.options().with_exclude(exclude))
            .run()
            .unwrap()
    }

    pub fn layout(&self) -> TargetLayout {
        TargetLayout::new(self.target.path())
    }

    pub fn mirror(&self, relative: &str) -> PathBuf {
        self.layout().mirror_path(relative)
    }

    pub fn archive(&self, relative: &str) -> PathBuf {
        self.layout().archive_path(relative)
    }

    pub fn cache_files(&self) -> CacheFiles {
        self.layout().cache_files(self.algorithm)
    }

    pub fn cache(&self) -> HashCache {
        HashCache::load(self.target.path(), self.algorithm).unwrap()
    }

    pub fn digest(&self, content: &str) -> String {
        self.algorithm.hash_bytes(content.as_bytes())
    }
}
