use regex::Regex;
use std::collections::HashSet;

use crate::error::Result;
use crate::thread::RemoteFile;

const VIDEOS: [&str; 2] = ["webm", "gif"];
const IMAGES: [&str; 2] = ["jpg", "png"];

/// Expand `--filter` arguments into a set of extensions.
///
/// Each argument is a comma-separated list of extensions or category names:
/// `["webm,images", "PNG"]` gives `{webm, jpg, png}`.
pub fn expand_filters<S: AsRef<str>>(filters: &[S]) -> HashSet<String> {
    let mut extensions = HashSet::new();
    for arg in filters {
        for kind in arg.as_ref().split(',').map(str::trim) {
            match kind {
                "" => {}
                "videos" => extensions.extend(VIDEOS.iter().map(|ext| ext.to_string())),
                "images" => extensions.extend(IMAGES.iter().map(|ext| ext.to_string())),
                ext => {
                    extensions.insert(ext.trim_start_matches('.').to_ascii_lowercase());
                }
            }
        }
    }
    extensions
}

/// Decides which of a thread's files to download.
#[derive(Debug, Default)]
pub struct FileFilter {
    extensions: Option<HashSet<String>>,
    pattern: Option<Regex>,
}

impl FileFilter {
    pub fn new<S: AsRef<str>>(filters: &[S], pattern: Option<&str>) -> Result<Self> {
        let extensions = expand_filters(filters);
        Ok(FileFilter {
            extensions: (!extensions.is_empty()).then_some(extensions),
            pattern: pattern.map(Regex::new).transpose()?,
        })
    }

    pub fn matches(&self, file: &RemoteFile) -> bool {
        let extension_ok = self
            .extensions
            .as_ref()
            .is_none_or(|extensions| extensions.contains(&file.extension.to_ascii_lowercase()));
        let name_ok = self
            .pattern
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(&file.name));
        extension_ok && name_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_helpers::remote_file;

    fn file(name: &str, extension: &str) -> RemoteFile {
        let mut file = remote_file(1, String::new(), b"");
        file.name = name.to_string();
        file.extension = extension.to_string();
        file
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_expand_plain_extensions() {
        assert_eq!(expand_filters(&["jpg", "webm"]), set(&["jpg", "webm"]));
        assert_eq!(expand_filters(&["jpg, webm", "png"]), set(&["jpg", "webm", "png"]));
    }

    #[test]
    fn test_expand_categories() {
        assert_eq!(expand_filters(&["webm,images"]), set(&["webm", "jpg", "png"]));
        assert_eq!(expand_filters(&["videos"]), set(&["webm", "gif"]));
    }

    #[test]
    fn test_expand_normalises() {
        assert_eq!(expand_filters(&[".PNG, ,"]), set(&["png"]));
        assert!(expand_filters::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_no_filters_match_everything() {
        let filter = FileFilter::new::<&str>(&[], None).unwrap();
        assert!(filter.matches(&file("a", "jpg")));
        assert!(filter.matches(&file("b", "webm")));
    }

    #[test]
    fn test_extension_filter() {
        let filter = FileFilter::new(&["images"], None).unwrap();
        assert!(filter.matches(&file("a", "jpg")));
        assert!(filter.matches(&file("a", "PNG")));
        assert!(!filter.matches(&file("a", "webm")));
    }

    #[test]
    fn test_name_filter() {
        let filter = FileFilter::new(&["videos"], Some("^loop")).unwrap();
        assert!(filter.matches(&file("loop1", "webm")));
        assert!(!filter.matches(&file("other", "webm")));
        assert!(!filter.matches(&file("loop1", "jpg")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            FileFilter::new::<&str>(&[], Some("(")),
            Err(Error::Pattern(_))
        ));
    }
}
