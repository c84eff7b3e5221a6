//! Declaration identifiers with name-mangling state.
//!
//! An identifier stores its original spelling plus an optional mangling
//! prefix; the rendered form is `prefix + original` and is stable across
//! repeated queries (renaming is idempotent).

use smol_str::SmolStr;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
enum RenameState {
    Unchanged,
    Renamed,
    Obfuscated(u32),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Ident {
    original: SmolStr,
    prefix: Option<SmolStr>,
    state: RenameState,
}

impl Ident {
    pub fn new(original: impl Into<SmolStr>) -> Ident {
        Ident {
            original: original.into(),
            prefix: None,
            state: RenameState::Unchanged,
        }
    }

    /// The spelling as written in the source.
    pub fn original(&self) -> &SmolStr {
        &self.original
    }

    pub fn is_anonymous(&self) -> bool {
        self.original.is_empty()
    }

    pub fn was_renamed(&self) -> bool {
        !matches!(self.state, RenameState::Unchanged)
    }

    /// Prepends the mangling prefix. Appending the same prefix twice is a
    /// no-op, so repeated registration passes stay idempotent.
    pub fn append_prefix(&mut self, prefix: &str) {
        match &self.prefix {
            Some(existing) if existing.as_str() == prefix => {}
            Some(existing) => {
                self.prefix = Some(SmolStr::from(format!("{prefix}{existing}")));
            }
            None => {
                self.prefix = Some(prefix.into());
            }
        }
        self.state = RenameState::Renamed;
    }

    pub fn remove_prefix(&mut self, prefix: &str) {
        if let Some(existing) = &self.prefix {
            if let Some(rest) = existing.as_str().strip_prefix(prefix) {
                self.prefix = if rest.is_empty() { None } else { Some(rest.into()) };
            }
        }
    }

    /// Replaces the identifier entirely (prefix is discarded).
    pub fn rename_to(&mut self, ident: impl Into<SmolStr>) {
        self.original = ident.into();
        self.prefix = None;
        self.state = RenameState::Renamed;
    }

    /// Renames to `_<counter>` for obfuscated output.
    pub fn rename_obfuscated(&mut self, counter: u32) {
        self.original = SmolStr::from(format!("_{counter}"));
        self.prefix = None;
        self.state = RenameState::Obfuscated(counter);
    }

    /// The rendered form: `prefix + original`.
    pub fn final_name(&self) -> SmolStr {
        match &self.prefix {
            Some(prefix) => SmolStr::from(format!("{}{}", prefix, self.original)),
            None => self.original.clone(),
        }
    }
}

impl From<&str> for Ident {
    fn from(text: &str) -> Ident {
        Ident::new(text)
    }
}

impl From<SmolStr> for Ident {
    fn from(text: SmolStr) -> Ident {
        Ident::new(text)
    }
}

impl From<String> for Ident {
    fn from(text: String) -> Ident {
        Ident::new(text)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.final_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_form_is_prefix_plus_original() {
        let mut ident = Ident::new("color");
        assert_eq!(ident.final_name(), "color");

        ident.append_prefix("xsr_");
        assert_eq!(ident.final_name(), "xsr_color");
        assert_eq!(ident.original(), "color");
    }

    #[test]
    fn renaming_is_idempotent() {
        let mut ident = Ident::new("sample");
        ident.append_prefix("xsr_");
        ident.append_prefix("xsr_");
        assert_eq!(ident.final_name(), "xsr_sample");

        let first = ident.final_name();
        assert_eq!(ident.final_name(), first);
    }

    #[test]
    fn obfuscation_discards_prefix() {
        let mut ident = Ident::new("normal");
        ident.append_prefix("xsr_");
        ident.rename_obfuscated(7);
        assert_eq!(ident.final_name(), "_7");
    }
}
