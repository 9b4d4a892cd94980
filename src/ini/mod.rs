//! INI settings store
//!
//! A minimal section/keypair format:
//!
//! ```text
//! [Name]
//! key=value
//! other=value
//!
//! [Name]
//! key=value
//! ```
//!
//! There are no comments and no quoting. Section names may repeat. Arrays are
//! stored as `key_len=N` followed by `key_0` .. `key_{N-1}`. Files written by
//! [`Ini::write`] are read back unchanged by [`Ini::read`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Longest key, value or section name accepted
pub const MAX_TOKEN_LEN: usize = 127;

/// INI error types
#[derive(Error, Debug)]
pub enum IniError {
    /// File could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// `[` without a closing `]` on the same line
    #[error("line {line}: unclosed section header")]
    UnclosedSection {
        /// 1-based line number
        line: usize,
    },

    /// A keypair line without `=`
    #[error("line {line}: expected '='")]
    MissingEquals {
        /// 1-based line number
        line: usize,
    },

    /// Something other than a section header outside any section, or
    /// trailing text after a header
    #[error("line {line}: unexpected token {token:?}")]
    UnexpectedToken {
        /// 1-based line number
        line: usize,
        /// Offending character
        token: char,
    },

    /// Token longer than [`MAX_TOKEN_LEN`]
    #[error("{what} {token:?} exceeds {max} bytes", max = MAX_TOKEN_LEN)]
    TooLong {
        /// `key`, `value` or `section name`
        what: &'static str,
        /// The token, as given
        token: String,
    },
}

/// Result type for INI operations
pub type Result<T> = std::result::Result<T, IniError>;

fn check_len(what: &'static str, token: &str) -> Result<()> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(IniError::TooLong {
            what,
            token: token.to_string(),
        });
    }
    Ok(())
}

/// A named group of keypairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    keypairs: Vec<(String, String)>,
}

impl IniSection {
    /// Empty section called `name`
    ///
    /// # Errors
    ///
    /// Returns [`IniError::TooLong`] if the name exceeds [`MAX_TOKEN_LEN`]
    pub fn new(name: &str) -> Result<Self> {
        check_len("section name", name)?;
        Ok(Self {
            name: name.to_string(),
            keypairs: Vec::new(),
        })
    }

    /// Section name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keypairs in file order
    pub fn keypairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keypairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of `key`
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.keypairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing any earlier value
    pub fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        check_len("key", key)?;
        check_len("value", value)?;
        match self.keypairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.keypairs.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.keypairs.iter().position(|(k, _)| k == key)?;
        Some(self.keypairs.remove(index).1)
    }

    /// Value of `key` as an integer
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get_string(key)?.trim().parse().ok()
    }

    /// Set `key` to an integer
    pub fn set_int(&mut self, key: &str, value: i32) -> Result<()> {
        self.set_string(key, &value.to_string())
    }

    /// Integer array stored under `key`
    ///
    /// `None` if the length entry or any element is missing or malformed.
    pub fn get_int_array(&self, key: &str) -> Option<Vec<i32>> {
        let len = self.array_len(key)?;
        (0..len)
            .map(|i| self.get_int(&element_key(key, i)))
            .collect()
    }

    /// Store `values` as an array under `key`
    pub fn set_int_array(&mut self, key: &str, values: &[i32]) -> Result<()> {
        let strings: Vec<String> = values.iter().map(i32::to_string).collect();
        self.set_array(key, &strings)
    }

    /// String array stored under `key`
    ///
    /// `None` if the length entry or any element is missing.
    pub fn get_string_array(&self, key: &str) -> Option<Vec<&str>> {
        let len = self.array_len(key)?;
        (0..len)
            .map(|i| self.get_string(&element_key(key, i)))
            .collect()
    }

    /// Store `values` as an array under `key`
    pub fn set_string_array<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> Result<()> {
        self.set_array(key, values)
    }

    fn array_len(&self, key: &str) -> Option<usize> {
        let len = self.get_int(&format!("{key}_len"))?;
        usize::try_from(len).ok()
    }

    fn set_array<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> Result<()> {
        let len = i32::try_from(values.len()).map_err(|_| IniError::TooLong {
            what: "value",
            token: format!("{key}_len"),
        })?;

        // Drop elements beyond the new length
        if let Some(old) = self.array_len(key) {
            for i in values.len()..old {
                self.remove(&element_key(key, i));
            }
        }

        self.set_int(&format!("{key}_len"), len)?;
        for (i, value) in values.iter().enumerate() {
            self.set_string(&element_key(key, i), value.as_ref())?;
        }
        Ok(())
    }
}

fn element_key(key: &str, index: usize) -> String {
    format!("{key}_{index}")
}

impl fmt::Display for IniSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.name)?;
        for (key, value) in &self.keypairs {
            writeln!(f, "{key}={value}")?;
        }
        writeln!(f)
    }
}

/// Parser state
enum State {
    /// Before the first section header
    Preamble,
    /// Collecting keypairs for a section
    InSection(IniSection),
}

/// An INI document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
    sections: Vec<IniSection>,
}

impl Ini {
    /// Empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document
    ///
    /// # Errors
    ///
    /// Fails on an unclosed section header, a keypair without `=`, text
    /// outside any section, or an oversized token.
    pub fn parse(input: &str) -> Result<Self> {
        let mut sections = Vec::new();
        let mut state = State::Preamble;

        for (index, line) in input.split('\n').enumerate() {
            let line_no = index + 1;

            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let end = rest
                    .find(']')
                    .ok_or(IniError::UnclosedSection { line: line_no })?;
                if let Some(token) = rest[end + 1..].chars().next() {
                    return Err(IniError::UnexpectedToken {
                        line: line_no,
                        token,
                    });
                }

                let section = IniSection::new(&rest[..end])?;
                let previous = std::mem::replace(&mut state, State::InSection(section));
                if let State::InSection(done) = previous {
                    sections.push(done);
                }
                continue;
            }

            let State::InSection(section) = &mut state else {
                return Err(IniError::UnexpectedToken {
                    line: line_no,
                    token: line.chars().next().unwrap_or('\n'),
                });
            };

            let (key, value) = line
                .split_once('=')
                .ok_or(IniError::MissingEquals { line: line_no })?;
            check_len("key", key)?;
            check_len("value", value)?;
            section
                .keypairs
                .push((key.to_string(), value.to_string()));
        }

        if let State::InSection(section) = state {
            sections.push(section);
        }

        debug!("Parsed {} INI sections", sections.len());
        Ok(Self { sections })
    }

    /// Read and parse the file at `path`
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| IniError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Write the document to `path`, replacing its contents
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(|source| IniError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All sections in file order
    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    /// First section called `name`
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// First section called `name`, mutably
    pub fn section_mut(&mut self, name: &str) -> Option<&mut IniSection> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Every section called `name`
    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IniSection> + 'a {
        self.sections.iter().filter(move |s| s.name == name)
    }

    /// Append `section`, returning it for further edits
    pub fn add_section(&mut self, section: IniSection) -> &mut IniSection {
        self.sections.push(section);
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }
}

impl fmt::Display for Ini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            write!(f, "{section}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[Monitor]\nname=LVDS-1\nx=0\n\n[Monitor]\nname=DP-2\nx=1920\n\n[Dock]\nenabled=1\n";

    // ===== Parsing =====

    #[test]
    fn test_parse_sections() {
        let ini = Ini::parse(SAMPLE).unwrap();
        assert_eq!(ini.sections().len(), 3);

        let monitors: Vec<_> = ini.sections_named("Monitor").collect();
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[1].get_string("name"), Some("DP-2"));
        assert_eq!(monitors[1].get_int("x"), Some(1920));

        assert_eq!(ini.section("Dock").unwrap().get_int("enabled"), Some(1));
        assert!(ini.section("Missing").is_none());
    }

    #[test]
    fn test_parse_empty() {
        assert!(Ini::parse("").unwrap().sections().is_empty());
        assert!(Ini::parse("\n\n").unwrap().sections().is_empty());
    }

    #[test]
    fn test_parse_value_with_equals_and_no_trailing_newline() {
        let ini = Ini::parse("[S]\nexpr=a=b").unwrap();
        assert_eq!(ini.section("S").unwrap().get_string("expr"), Some("a=b"));
    }

    #[test]
    fn test_blank_lines_inside_section() {
        let ini = Ini::parse("[S]\na=1\n\n\nb=2\n").unwrap();
        let s = ini.section("S").unwrap();
        assert_eq!(s.get_int("a"), Some(1));
        assert_eq!(s.get_int("b"), Some(2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Ini::parse("[Open\nkey=value\n"),
            Err(IniError::UnclosedSection { line: 1 })
        ));
        assert!(matches!(
            Ini::parse("[S]\nnovalue\n"),
            Err(IniError::MissingEquals { line: 2 })
        ));
        assert!(matches!(
            Ini::parse("key=value\n[S]\n"),
            Err(IniError::UnexpectedToken { line: 1, token: 'k' })
        ));
        assert!(matches!(
            Ini::parse("[S] trailing\n"),
            Err(IniError::UnexpectedToken { line: 1, token: ' ' })
        ));
    }

    #[test]
    fn test_oversized_tokens() {
        let long = "k".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            Ini::parse(&format!("[S]\n{long}=1\n")),
            Err(IniError::TooLong { what: "key", .. })
        ));
        assert!(matches!(
            Ini::parse(&format!("[S]\nkey={long}\n")),
            Err(IniError::TooLong { what: "value", .. })
        ));

        let mut section = IniSection::new("S").unwrap();
        assert!(section.set_string("key", &long).is_err());
        assert!(section.set_string(&"k".repeat(MAX_TOKEN_LEN), "ok").is_ok());
    }

    // ===== Writing =====

    #[test]
    fn test_write_format() {
        let mut ini = Ini::new();
        let section = ini.add_section(IniSection::new("Layout").unwrap());
        section.set_string("primary", "LVDS-1").unwrap();
        section.set_int("rotate", 90).unwrap();

        assert_eq!(ini.to_string(), "[Layout]\nprimary=LVDS-1\nrotate=90\n\n");
    }

    #[test]
    fn test_write_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ini");

        let original = Ini::parse(SAMPLE).unwrap();
        original.write(&path).unwrap();
        let reread = Ini::read(&path).unwrap();

        assert_eq!(original, reread);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Ini::read(dir.path().join("absent.ini")),
            Err(IniError::Io { .. })
        ));
    }

    // ===== Values =====

    #[test]
    fn test_set_replaces() {
        let mut section = IniSection::new("S").unwrap();
        section.set_int("x", 1).unwrap();
        section.set_int("x", 2).unwrap();
        assert_eq!(section.get_int("x"), Some(2));
        assert_eq!(section.keypairs().count(), 1);
    }

    #[test]
    fn test_get_int_malformed() {
        let ini = Ini::parse("[S]\nx=abc\n").unwrap();
        assert_eq!(ini.section("S").unwrap().get_int("x"), None);
        assert_eq!(ini.section("S").unwrap().get_int("y"), None);
    }

    #[test]
    fn test_int_array() {
        let mut section = IniSection::new("S").unwrap();
        section.set_int_array("pos", &[0, 1920, -5]).unwrap();
        assert_eq!(section.get_string("pos_len"), Some("3"));
        assert_eq!(section.get_string("pos_1"), Some("1920"));
        assert_eq!(section.get_int_array("pos"), Some(vec![0, 1920, -5]));

        section.set_int_array("pos", &[7]).unwrap();
        assert_eq!(section.get_int_array("pos"), Some(vec![7]));
        assert_eq!(section.get_string("pos_2"), None);
    }

    #[test]
    fn test_string_array() {
        let mut section = IniSection::new("S").unwrap();
        section.set_string_array("outputs", &["LVDS-1", "DP-2"]).unwrap();
        assert_eq!(
            section.get_string_array("outputs"),
            Some(vec!["LVDS-1", "DP-2"])
        );
        assert_eq!(section.get_string_array("missing"), None);
    }

    #[test]
    fn test_array_with_missing_element() {
        let ini = Ini::parse("[S]\na_len=2\na_0=1\n").unwrap();
        assert_eq!(ini.section("S").unwrap().get_int_array("a"), None);
    }

    #[test]
    fn test_section_mut() {
        let mut ini = Ini::parse(SAMPLE).unwrap();
        ini.section_mut("Dock").unwrap().set_int("enabled", 0).unwrap();
        assert_eq!(ini.section("Dock").unwrap().get_int("enabled"), Some(0));
    }
}
