//! Filesystem content source.
//!
//! Walks a root directory depth-first in sorted order (so the enumeration is
//! deterministic, as the pipeline's skip-and-resume semantics require) and
//! turns matching text files into [`ContentItem`]s.

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::SourceConfig;
use crate::models::ContentItem;
use crate::reindex::ContentSource;

pub struct FilesystemSource {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FilesystemSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if !config.root.exists() {
            bail!("source root does not exist: {}", config.root.display());
        }

        let include = build_globset(&config.include_globs)?;

        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(config.exclude_globs.clone());
        let exclude = build_globset(&default_excludes)?;

        Ok(Self {
            root: config.root.clone(),
            include,
            exclude,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Exclude-glob check used to prune the walk before descent. Directories
    /// are matched with a trailing slash so `**/.git/**` style patterns stop
    /// the walker at the directory instead of filtering its files one by one.
    fn excluded(&self, entry: &DirEntry) -> bool {
        let path = entry.path();
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            return false; // the root itself
        }
        let rel = relative.to_string_lossy();
        if entry.file_type().is_dir() {
            self.exclude.is_match(format!("{}/", rel))
        } else {
            self.exclude.is_match(rel.as_ref())
        }
    }
}

impl ContentSource for FilesystemSource {
    fn walk(&self) -> Box<dyn Iterator<Item = (String, ContentItem)> + '_> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.excluded(entry));
        Box::new(walker.filter_map(move |entry| {
            let entry = entry.ok()?;
            if !entry.file_type().is_file() {
                return None;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if !self.include.is_match(&rel_str) {
                return None;
            }
            let item = file_to_item(path, &rel_str)?;
            Some((rel_str, item))
        }))
    }
}

fn file_to_item(path: &Path, relative: &str) -> Option<ContentItem> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let modified_secs = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let modified = Utc.timestamp_opt(modified_secs, 0).single()?;

    let body = std::fs::read_to_string(path).unwrap_or_default();
    let title = path.file_name().map(|n| n.to_string_lossy().to_string());

    let mut fields = HashMap::new();
    fields.insert("id".to_string(), relative.to_string());
    if let Some(title) = &title {
        fields.insert("Title".to_string(), title.clone());
    }
    fields.insert("SearchableText".to_string(), body);
    fields.insert("modified".to_string(), modified.to_rfc3339());

    Some(ContentItem {
        id: relative.to_string(),
        title,
        content_type: content_type_for(path),
        modified,
        fields,
    })
}

fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") => "text/markdown".to_string(),
        Some("html") | Some("htm") => "text/html".to_string(),
        _ => "text/plain".to_string(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
