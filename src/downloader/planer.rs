use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use super::Job;
use crate::error::{Error, Result};
use crate::thread::RemoteFile;
use crate::utils::text::make_filename;

pub const DEFAULT_NAME_TEMPLATE: &str = "{id}.{extension}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
    Name,
    Extension,
}

/// File name format with `{id}`, `{name}` and `{extension}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if template.is_empty() {
            return Err(invalid("template is empty"));
        }
        if template.contains(['/', '\\']) {
            return Err(invalid("path separators are not allowed"));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        key.push(c);
                    }
                    if !closed {
                        return Err(invalid("unclosed placeholder"));
                    }
                    let segment = match key.as_str() {
                        "id" => Segment::Id,
                        "name" => Segment::Name,
                        "extension" => Segment::Extension,
                        _ => return Err(invalid(&format!("unknown placeholder {{{}}}", key))),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(invalid("unmatched '}'")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(NameTemplate { segments })
    }

    pub fn render(&self, file: &RemoteFile) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Id => file.id.to_string(),
                Segment::Name => make_filename(&file.name).unwrap_or_else(|_| file.id.to_string()),
                Segment::Extension => file.extension.clone(),
            })
            .collect()
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        NameTemplate {
            segments: vec![
                Segment::Id,
                Segment::Literal(".".to_string()),
                Segment::Extension,
            ],
        }
    }
}

impl FromStr for NameTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NameTemplate::parse(s)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "{}", text)?,
                Segment::Id => write!(f, "{{id}}")?,
                Segment::Name => write!(f, "{{name}}")?,
                Segment::Extension => write!(f, "{{extension}}")?,
            }
        }
        Ok(())
    }
}

/// Resolve every file to a destination under `directory`.
///
/// Files whose rendered names collide with an earlier file fall back to
/// `{id}.{extension}`; a collision that persists is an error, since two
/// workers must never write the same path.
pub fn plan(directory: &Path, template: &NameTemplate, files: &[RemoteFile]) -> Result<Vec<Job>> {
    let mut taken = HashSet::new();
    let mut jobs = Vec::with_capacity(files.len());

    for file in files {
        let rendered = template.render(file);
        let mut destination = directory.join(&rendered);
        if rendered == "." || rendered == ".." || taken.contains(&destination) {
            let fallback = directory.join(format!("{}.{}", file.id, file.extension));
            warn!(
                "{} cannot be saved as {:?}; using {}",
                file,
                rendered,
                fallback.display()
            );
            destination = fallback;
        }
        if !taken.insert(destination.clone()) {
            return Err(Error::DuplicateDestination(destination));
        }
        jobs.push(Job {
            file: file.clone(),
            destination,
        });
    }
    Ok(jobs)
}
