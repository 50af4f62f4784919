//! Natural (numeric-aware) ordering of file names.
//!
//! A name is lowercased and split into alternating text and digit runs,
//! always starting with a (possibly empty) text run. Text runs compare
//! lexicographically, digit runs compare by numeric value, so `page2`
//! sorts before `page10`.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    /// Digit run with leading zeros stripped.
    Number(String),
}

impl Segment {
    fn cmp_same_kind(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Number(a), Segment::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            // Segments alternate from a text run, so kinds line up by position.
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
        }
    }
}

/// Sort key for natural ordering of a single name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    segments: Vec<Segment>,
}

impl NaturalKey {
    pub fn new(name: &str) -> Self {
        let lower = name.to_lowercase();
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut digits = String::new();

        for ch in lower.chars() {
            if ch.is_ascii_digit() {
                if digits.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                digits.push(ch);
            } else {
                if !digits.is_empty() {
                    segments.push(number_segment(std::mem::take(&mut digits)));
                }
                text.push(ch);
            }
        }
        if !digits.is_empty() {
            segments.push(number_segment(digits));
        }
        segments.push(Segment::Text(text));

        Self { segments }
    }
}

fn number_segment(digits: String) -> Segment {
    let trimmed = digits.trim_start_matches('0');
    Segment::Number(trimmed.to_string())
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match a.cmp_same_kind(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Natural key of a path's file name.
pub fn path_key(path: &Path) -> NaturalKey {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    NaturalKey::new(&name)
}

/// Compare two paths by file name in natural order, falling back to the
/// full path so the order is total.
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    path_key(a).cmp(&path_key(b)).then_with(|| a.cmp(b))
}

/// Sort paths in place by natural file-name order.
pub fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|p| (path_key(p), p.clone()));
}
