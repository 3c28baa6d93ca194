use regex::Regex;

/// Minimal prefix matcher used to tokenize literals.
///
/// A thin wrapper over the `regex` crate that anchors every expression to the
/// start of its input: combinators only ever ask "does a leading run of this
/// pattern exist, and where does it end".
#[derive(Debug)]
pub struct Pattern {
    regex: Regex,
}

/// A successful prefix match.
#[derive(Debug, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// Text of the first capture group if the expression has one, otherwise
    /// the whole match.
    pub text: &'a str,
    /// Byte offset one past the whole match; the unconsumed input starts here.
    pub end: usize,
}

impl Pattern {
    pub fn new(expr: &str) -> Result<Pattern, regex::Error> {
        let regex = Regex::new(&format!(r"\A(?:{})", expr))?;
        Ok(Pattern { regex })
    }

    pub fn match_prefix<'a>(&self, input: &'a str) -> Option<PrefixMatch<'a>> {
        let caps = self.regex.captures(input)?;
        let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let text = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_else(|| caps.get(0).map(|m| m.as_str()).unwrap_or(""));
        Some(PrefixMatch { text, end: whole })
    }
}
