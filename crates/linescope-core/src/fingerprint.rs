use sha2::{Digest, Sha256};
use tracing::trace;

use crate::editor::{Action, Editor, Side};
use crate::EditError;

pub const BEGIN: &str = "BEGIN";
pub const END: &str = "END";
pub const REPLACE: &str = "REPLACE";
pub const REPLACE_LINE: &str = "REPLACE_LINE";
pub const REPLACE_REGEX: &str = "REPLACE_REGEX";
pub const INSERT: &str = "INSERT";

/// Ordered token stream describing an edit script.
///
/// Two scripts making the same calls with the same literal arguments produce
/// equal fingerprints, whatever content they would be applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    tokens: Vec<String>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root editor recording into this fingerprint.
    pub fn editor(&mut self) -> FingerprintEditor<'_> {
        FingerprintEditor::new(&mut self.tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Lowercase hex SHA-256 over the length-framed tokens.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hash_tokens(&mut hasher, &self.tokens);
        format!("{:x}", hasher.finalize())
    }
}

impl From<Vec<String>> for Fingerprint {
    fn from(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

/// Feed `tokens` to `hasher`, each prefixed by its byte length.
pub fn hash_tokens<'a>(hasher: &mut Sha256, tokens: impl IntoIterator<Item = &'a String>) {
    for token in tokens {
        hasher.update((token.len() as u64).to_le_bytes());
        hasher.update(token.as_bytes());
    }
}

/// Editor recording the operations it is asked to perform instead of applying them.
///
/// No marker is looked up and no regex is compiled: the recorded stream is
/// purely syntactic over the calls made.
pub struct FingerprintEditor<'a> {
    tokens: &'a mut Vec<String>,
}

impl<'a> FingerprintEditor<'a> {
    pub fn new(tokens: &'a mut Vec<String>) -> Self {
        Self { tokens }
    }

    fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }
}

impl Editor for FingerprintEditor<'_> {
    fn scope(&mut self, side: Side, marker: &str, action: &mut Action<'_>) -> Result<(), EditError> {
        let direction = match side {
            Side::Before => "BEFORE",
            Side::After => "AFTER",
        };
        trace!(%side, marker, "record scope");
        self.push(format!("{direction} LINE {marker}"));
        self.push(BEGIN);
        let result = action(&mut FingerprintEditor::new(&mut *self.tokens));
        self.push(END);
        result
    }

    fn replace(&mut self, replacement: &str) -> Result<(), EditError> {
        trace!(replacement, "record replace");
        self.push(REPLACE);
        self.push(replacement);
        Ok(())
    }

    fn replace_line(&mut self, line: &str, replacement: &str) -> Result<(), EditError> {
        trace!(line, replacement, "record replace_line");
        self.push(REPLACE_LINE);
        self.push(line);
        self.push(replacement);
        Ok(())
    }

    fn replace_regex(&mut self, regex: &str, replacement: &str) -> Result<(), EditError> {
        trace!(regex, replacement, "record replace_regex");
        self.push(REPLACE_REGEX);
        self.push(regex);
        self.push(replacement);
        Ok(())
    }

    fn insert(&mut self, lines: &[&str]) -> Result<(), EditError> {
        trace!(count = lines.len(), "record insert");
        self.push(format!("{INSERT} {}", lines.len()));
        self.tokens.extend(lines.iter().map(|l| l.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionEditor;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn script(editor: &mut dyn Editor, replacement: &str) -> Result<(), EditError> {
        editor.after("FROM base", &mut |e| {
            e.before("ENTRYPOINT", &mut |e| e.replace_line("RUN a", replacement))?;
            e.insert(&["ENV X=1"])
        })?;
        editor.replace_regex("^COPY (.*)$", "COPY --link $1")
    }

    fn record(replacement: &str) -> Fingerprint {
        let mut fp = Fingerprint::new();
        script(&mut fp.editor(), replacement).unwrap();
        fp
    }

    #[test]
    fn records_calls_in_order() {
        let fp = record("RUN b");
        assert_eq!(
            fp.tokens(),
            &[
                "AFTER LINE FROM base",
                "BEGIN",
                "BEFORE LINE ENTRYPOINT",
                "BEGIN",
                "REPLACE_LINE",
                "RUN a",
                "RUN b",
                "END",
                "INSERT 1",
                "ENV X=1",
                "END",
                "REPLACE_REGEX",
                "^COPY (.*)$",
                "COPY --link $1",
            ]
        );
    }

    #[test]
    fn same_calls_same_fingerprint() {
        assert_eq!(record("RUN b"), record("RUN b"));
        assert_eq!(record("RUN b").digest(), record("RUN b").digest());
    }

    #[test]
    fn changed_literal_changes_fingerprint() {
        assert_ne!(record("RUN b"), record("RUN c"));
        assert_ne!(record("RUN b").digest(), record("RUN c").digest());
    }

    #[test]
    fn fingerprint_does_not_depend_on_content() {
        // Markers absent from this content would fail a real edit.
        let mut lines = vec!["unrelated".to_string()];
        assert!(script(&mut RegionEditor::new(&mut lines), "RUN b").is_err());
        assert_eq!(record("RUN b").tokens().len(), 14);
    }

    #[test]
    fn nesting_depth_is_recorded() {
        let mut flat = Fingerprint::new();
        {
            let mut e = flat.editor();
            e.after("M", &mut |_| Ok(())).unwrap();
            e.replace("x").unwrap();
        }
        let mut nested = Fingerprint::new();
        nested
            .editor()
            .after("M", &mut |e| e.replace("x"))
            .unwrap();
        assert_ne!(flat, nested);
    }

    #[test]
    fn insert_count_disambiguates_arguments() {
        let mut one = Fingerprint::new();
        one.editor().insert(&["a", REPLACE, "b"]).unwrap();

        let mut two = Fingerprint::new();
        {
            let mut e = two.editor();
            e.insert(&["a"]).unwrap();
            e.replace("b").unwrap();
        }
        assert_ne!(one, two);
    }

    #[test]
    fn digest_frames_token_boundaries() {
        let joined = Fingerprint::from(vec!["ab".to_string()]);
        let split = Fingerprint::from(vec!["a".to_string(), "b".to_string()]);
        assert_ne!(joined.digest(), split.digest());
        assert_eq!(joined.digest().len(), 64);
    }

    #[test]
    fn scope_is_closed_when_action_fails() {
        let mut fp = Fingerprint::new();
        let err = fp
            .editor()
            .before("M", &mut |_| Err(EditError::EmptyDocument))
            .unwrap_err();
        assert!(matches!(err, EditError::EmptyDocument));
        assert_eq!(fp.tokens(), &["BEFORE LINE M", "BEGIN", "END"]);
    }

    #[test]
    fn invalid_regex_is_recorded_not_compiled() {
        let mut fp = Fingerprint::new();
        fp.editor().replace_regex("(", "x").unwrap();
        assert_eq!(fp.tokens(), &["REPLACE_REGEX", "(", "x"]);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_recorded_operation_is_traced() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut fp = Fingerprint::new();
            fp.editor()
                .after("M", &mut |e| {
                    e.replace("x")?;
                    e.replace_line("a", "b")?;
                    e.replace_regex("c", "d")?;
                    e.insert(&["e"])
                })
                .unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let messages: Vec<&str> = output
            .lines()
            .filter_map(|l| l.split("record ").nth(1))
            .map(|rest| rest.split_whitespace().next().unwrap_or(""))
            .collect();
        assert_eq!(
            messages,
            vec!["scope", "replace", "replace_line", "replace_regex", "insert"]
        );
    }
}
