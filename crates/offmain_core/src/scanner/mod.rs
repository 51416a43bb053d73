//! Finds worker-construction call sites in JavaScript source.
//!
//! Scanning is two passes: a [`RegionClassifier`] marks strings, comments and
//! template text as opaque, then a [`CallMatcher`] looks for calls in what
//! remains.

pub mod lexer;
pub mod matcher;
pub mod options;

pub use lexer::{JsLexer, Region, RegionClassifier, RegionKind};
pub use matcher::{CallMatcher, OptionsArgument, PendingReference, SourceForm, WorkerCallMatcher};
pub use options::{OptionValue, OptionsError, WorkerOptions};

pub struct Scanner<C = JsLexer, M = WorkerCallMatcher> {
    classifier: C,
    matcher: M,
}

impl Scanner {
    pub fn for_constructors<I, S>(constructors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(JsLexer, WorkerCallMatcher::new(constructors))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(JsLexer, WorkerCallMatcher::default())
    }
}

impl<C: RegionClassifier, M: CallMatcher> Scanner<C, M> {
    pub fn new(classifier: C, matcher: M) -> Self {
        Self { classifier, matcher }
    }

    pub fn scan(&self, source: &str) -> Vec<PendingReference> {
        let regions = self.classifier.classify(source);
        self.matcher.find(source, &regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_constructor_names() {
        let scanner = Scanner::for_constructors(["MyWorker"]);
        let refs = scanner.scan("new MyWorker('./a.js'); new Worker('./b.js');");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].constructor, "MyWorker");
    }

    #[test]
    fn test_multiple_references_in_order() {
        let refs = Scanner::default().scan(
            "new Worker('./a.js');\nnew Worker(new URL('./b.js', import.meta.url));\nnew Worker(import.meta.url);",
        );
        let forms: Vec<_> = refs.iter().map(|r| r.form).collect();
        assert_eq!(
            forms,
            vec![SourceForm::LiteralPath, SourceForm::UrlWrappedLiteral, SourceForm::SelfUrl]
        );
    }

    #[test]
    fn test_reference_after_postfix_division() {
        let refs = Scanner::default()
            .scan("x = n++ / 2; const w = new Worker(\"./w.js\"); y = z / 4;");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].form, SourceForm::LiteralPath);
    }
}
