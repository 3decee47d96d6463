//! Conversion of whole directories of documents.

use crate::config::Config;
use crate::error::{Conversion, Diagnostic, MarkupError};
use crate::markup::{Document, Position};
use crate::{md, rst};
use linked_hash_map::LinkedHashMap;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Markdown,
    ReStructuredText,
}

impl Format {
    /// Picks the converter for a file by its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "md" => Some(Format::Markdown),
            "rst" => Some(Format::ReStructuredText),
            _ => None,
        }
    }

    pub fn convert(&self, src: &str, config: &Config) -> Result<Conversion, MarkupError> {
        match self {
            Format::Markdown => md::convert_with(src, &config.markdown),
            Format::ReStructuredText => rst::convert_with(src, &config.rst),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Markdown => ".md",
            Format::ReStructuredText => ".rst",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Markdown => write!(f, "markdown"),
            Format::ReStructuredText => write!(f, "restructuredtext"),
        }
    }
}

fn at(pos: &Option<Position>) -> String {
    pos.map(|p| format!(" at {}", p)).unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No converter for {ext} registered ({})", .path.display())]
    NoConverter { path: PathBuf, ext: String },

    #[error("Error parsing {ext} file {}{}", .path.display(), at(.pos))]
    Parse {
        path: PathBuf,
        ext: &'static str,
        pos: Option<Position>,
        #[source]
        source: MarkupError,
    },

    #[error("Error converting the {ext} AST of {}{}", .path.display(), at(.pos))]
    Ast {
        path: PathBuf,
        ext: &'static str,
        pos: Option<Position>,
        #[source]
        source: MarkupError,
    },

    #[error("Could not read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not walk the input directory")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid exclude pattern")]
    Pattern(#[from] regex::Error),
}

/// Reads and converts a single file.
pub fn convert_file<P: AsRef<Path>>(path: P, config: &Config) -> Result<Conversion, BuildError> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| BuildError::NoConverter {
        path: path.to_path_buf(),
        ext: path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    })?;

    let src = fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    format.convert(&src, config).map_err(|source| {
        let path = path.to_path_buf();
        let ext = format.extension();
        let pos = source.pos();
        match source {
            MarkupError::Parse(_) => BuildError::Parse {
                path,
                ext,
                pos,
                source,
            },
            MarkupError::Ast(_) => BuildError::Ast {
                path,
                ext,
                pos,
                source,
            },
        }
    })
}

/// Outcome of converting one file of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Draft,
}

#[derive(Debug, Default)]
pub struct Rendered {
    /// Documents by path relative to the input directory, `/`-separated, in walk order.
    pub documents: LinkedHashMap<String, Document>,
    pub warnings: Vec<(PathBuf, Diagnostic)>,
}

/// Converts every Markdown and reStructuredText file below `dir`. `progress` is called
/// for each converted file.
pub fn render_dir_with<P, F>(dir: P, config: &Config, mut progress: F) -> Result<Rendered, BuildError>
where
    P: AsRef<Path>,
    F: FnMut(&Path, Format, Status),
{
    let exclude = config
        .exclude
        .iter()
        .map(|pattern| Regex::new(pattern))
        .collect::<Result<Vec<_>, _>>()?;

    let dir = dir.as_ref();
    let mut rendered = Rendered::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if exclude.iter().any(|r| r.is_match(&name)) {
            continue;
        }
        let format = match Format::from_path(entry.path()) {
            Some(format) => format,
            None => continue,
        };

        let Conversion { document, warnings } = convert_file(entry.path(), config)?;
        rendered.warnings.extend(
            warnings
                .into_iter()
                .map(|w| (entry.path().to_path_buf(), w)),
        );

        if document.is_draft() && !config.drafts {
            progress(entry.path(), format, Status::Draft);
            continue;
        }
        progress(entry.path(), format, Status::Done);
        rendered.documents.insert(document_key(dir, entry.path()), document);
    }

    Ok(rendered)
}

fn document_key(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn render_dir<P: AsRef<Path>>(dir: P, config: &Config) -> Result<Rendered, BuildError> {
    render_dir_with(dir, config, |_, _, _| {})
}
