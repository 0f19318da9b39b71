//! Token-substitution engine for launcher templates
//!
//! Templates use the `@@WORD@@` placeholder syntax. The set of recognized
//! placeholders is a closed enum; a template containing a token that is either
//! unrecognized or missing from the supplied replacements fails the whole
//! render. Unreplaced tokens must never reach a shipped launcher.

use crate::error::{PackError, PackResult};
use std::fs;
use std::path::Path;

/// Shell launcher template (Unix)
pub const APP_SH: &str = include_str!("../templates/app.sh");
/// Batch launcher template (Windows)
pub const APP_BAT: &str = include_str!("../templates/app.bat");
/// Native wrapper source template
pub const APP_CPP: &str = include_str!("../templates/app.cpp");
/// Build configuration copied next to the rendered wrapper source
pub const CMAKE_LISTS: &str = include_str!("../templates/CMakeLists.txt");
/// License text dropped into every bundle
pub const LICENSE_TEXT: &str = include_str!("../templates/gempack-license.txt");

/// Name of the license file inside the bundle
pub const LICENSE_FILE_NAME: &str = "gempack-license.txt";

/// The placeholders shipped templates may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Interpreter invocation command for one entry point
    Command,
    /// Runtime version tag, e.g. `python3.11`
    Python,
}

impl Placeholder {
    /// The literal token as it appears in template text
    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::Command => "@@COMMAND@@",
            Placeholder::Python => "@@PYTHON@@",
        }
    }

    /// Look up a placeholder by its bare word (the part between the `@@`s)
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "COMMAND" => Some(Placeholder::Command),
            "PYTHON" => Some(Placeholder::Python),
            _ => None,
        }
    }
}

/// Replacement values for a single render
#[derive(Debug, Clone, Default)]
pub struct Replacements {
    values: Vec<(Placeholder, String)>,
}

impl Replacements {
    /// Empty replacement set (valid for templates without placeholders)
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a value for a placeholder
    pub fn set(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.retain(|(p, _)| *p != placeholder);
        self.values.push((placeholder, value.into()));
        self
    }

    fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values
            .iter()
            .find(|(p, _)| *p == placeholder)
            .map(|(_, v)| v.as_str())
    }
}

/// Render template text, substituting every `@@[A-Z]+@@` token.
///
/// `template` is the template's name, used only for error reporting.
pub fn render(template: &str, text: &str, replacements: &Replacements) -> PackResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("@@") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let word_len = after
            .bytes()
            .take_while(|b| b.is_ascii_uppercase())
            .count();

        if word_len > 0 && after[word_len..].starts_with("@@") {
            let word = &after[..word_len];
            let value = Placeholder::from_word(word)
                .and_then(|p| replacements.get(p))
                .ok_or_else(|| PackError::Template {
                    token: format!("@@{}@@", word),
                    template: template.to_string(),
                })?;
            out.push_str(value);
            rest = &after[word_len + 2..];
        } else {
            // A lone `@@` that does not open a token is literal text
            out.push_str("@@");
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Render template text and write the result to `dest`.
///
/// The render completes in memory first; a failed render never leaves a
/// partial file behind.
pub fn render_to_file(
    template: &str,
    text: &str,
    replacements: &Replacements,
    dest: &Path,
) -> PackResult<()> {
    let rendered = render(template, text, replacements)?;
    fs::write(dest, rendered)?;
    Ok(())
}
