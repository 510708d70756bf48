//! Minimal systemd unit file handling.
//!
//! The canonical serialization matches what the fleet daemon hashes, so a
//! locally computed [`UnitFile::hash`] can be compared to the hash it reports
//! for a scheduled unit.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(section: &str, name: &str, value: &str) -> Self {
        Self {
            section: section.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFile {
    options: Vec<UnitOption>,
}

impl UnitFile {
    pub fn from_options(options: Vec<UnitOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[UnitOption] {
        &self.options
    }

    pub fn into_options(self) -> Vec<UnitOption> {
        self.options
    }

    pub fn parse(content: &str) -> Result<Self, CoreError> {
        let mut options = Vec::new();
        let mut section: Option<String> = None;
        let mut pending: Option<(usize, String)> = None;

        for (idx, raw) in content.lines().enumerate() {
            let lineno = idx + 1;

            // Continuation of the previous option line.
            if let Some((start, mut acc)) = pending.take() {
                let trimmed = raw.trim();
                match trimmed.strip_suffix('\\') {
                    Some(rest) => {
                        acc.push(' ');
                        acc.push_str(rest.trim_end());
                        pending = Some((start, acc));
                    }
                    None => {
                        acc.push(' ');
                        acc.push_str(trimmed);
                        push_option(&mut options, section.as_deref(), start, &acc)?;
                    }
                }
                continue;
            }

            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| CoreError::UnitFile {
                    line: lineno,
                    message: format!("unterminated section header '{line}'"),
                })?;
                if name.is_empty() {
                    return Err(CoreError::UnitFile {
                        line: lineno,
                        message: "empty section name".to_string(),
                    });
                }
                section = Some(name.to_string());
                continue;
            }

            match line.strip_suffix('\\') {
                Some(rest) => pending = Some((lineno, rest.trim_end().to_string())),
                None => push_option(&mut options, section.as_deref(), lineno, line)?,
            }
        }

        if let Some((start, acc)) = pending {
            push_option(&mut options, section.as_deref(), start, &acc)?;
        }

        Ok(Self { options })
    }

    /// Sections in first-seen order, one blank line between sections.
    pub fn serialize(&self) -> String {
        let mut sections: Vec<(&str, Vec<&UnitOption>)> = Vec::new();
        for opt in &self.options {
            match sections.iter_mut().find(|(s, _)| *s == opt.section) {
                Some((_, opts)) => opts.push(opt),
                None => sections.push((opt.section.as_str(), vec![opt])),
            }
        }

        let mut out = String::new();
        let last = sections.len().saturating_sub(1);
        for (i, (section, opts)) in sections.iter().enumerate() {
            out.push('[');
            out.push_str(section);
            out.push_str("]\n");
            for opt in opts {
                out.push_str(&opt.name);
                out.push('=');
                out.push_str(&opt.value);
                out.push('\n');
            }
            if i < last {
                out.push('\n');
            }
        }
        out
    }

    /// Lowercase hex SHA-1 of [`UnitFile::serialize`].
    pub fn hash(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.serialize().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// `[X-Fleet] Global=true`, matched case-insensitively.
    pub fn is_global(&self) -> bool {
        self.options.iter().any(|o| {
            o.section.eq_ignore_ascii_case("x-fleet")
                && o.name.eq_ignore_ascii_case("global")
                && o.value.trim().eq_ignore_ascii_case("true")
        })
    }
}

fn push_option(
    options: &mut Vec<UnitOption>,
    section: Option<&str>,
    lineno: usize,
    line: &str,
) -> Result<(), CoreError> {
    let section = section.ok_or_else(|| CoreError::UnitFile {
        line: lineno,
        message: "option outside of any section".to_string(),
    })?;
    let (name, value) = line.split_once('=').ok_or_else(|| CoreError::UnitFile {
        line: lineno,
        message: format!("expected Key=Value, got '{line}'"),
    })?;
    options.push(UnitOption::new(section, name.trim(), value.trim()));
    Ok(())
}

/// Parses `content` and returns its canonical hash.
pub fn hash_content(content: &str) -> Result<String, CoreError> {
    Ok(UnitFile::parse(content)?.hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# comment
[Unit]
Description=web server

[Service]
ExecStart=/usr/bin/docker run \\
  --rm nginx
; trailing comment
Restart=always
";

    #[test]
    fn parse_keeps_order_and_joins_continuations() {
        let uf = UnitFile::parse(SAMPLE).unwrap();
        let opts = uf.options();
        assert_eq!(opts.len(), 3);
        assert_eq!(opts[0], UnitOption::new("Unit", "Description", "web server"));
        assert_eq!(opts[1].value, "/usr/bin/docker run --rm nginx");
        assert_eq!(opts[2].name, "Restart");
    }

    #[test]
    fn serialize_canonical_form() {
        let uf = UnitFile::parse(SAMPLE).unwrap();
        assert_eq!(
            uf.serialize(),
            "[Unit]\nDescription=web server\n\n[Service]\nExecStart=/usr/bin/docker run --rm nginx\nRestart=always\n"
        );
    }

    #[test]
    fn interleaved_sections_are_grouped() {
        let uf = UnitFile::from_options(vec![
            UnitOption::new("Unit", "A", "1"),
            UnitOption::new("Service", "B", "2"),
            UnitOption::new("Unit", "C", "3"),
        ]);
        assert_eq!(uf.serialize(), "[Unit]\nA=1\nC=3\n\n[Service]\nB=2\n");
    }

    #[test]
    fn hash_ignores_formatting_noise() {
        let a = hash_content("[Unit]\nDescription=x\n").unwrap();
        let b = hash_content("# hi\n[Unit]\n  Description = x  \n\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        let c = hash_content("[Unit]\nDescription=y\n").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn empty_file_hashes_empty_input() {
        // sha1("")
        assert_eq!(
            UnitFile::default().hash(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn global_detection_is_case_insensitive() {
        let uf = UnitFile::parse("[x-fleet]\nglobal=TRUE\n").unwrap();
        assert!(uf.is_global());
        let uf = UnitFile::parse("[X-Fleet]\nGlobal=false\n").unwrap();
        assert!(!uf.is_global());
        let uf = UnitFile::parse("[Unit]\nGlobal=true\n").unwrap();
        assert!(!uf.is_global());
    }

    #[test]
    fn rejects_option_outside_section() {
        let err = UnitFile::parse("Description=x\n").unwrap_err();
        assert!(matches!(err, CoreError::UnitFile { line: 1, .. }));
        assert!(UnitFile::parse("[Unit\n").is_err());
        assert!(UnitFile::parse("[Unit]\nnovalue\n").is_err());
    }
}
