/// The grammar's root rule matched, but input remained unconsumed.
///
/// `rest` carries the unconsumed suffix (trailing whitespace already
/// stripped). Parsing itself never raises; this is produced only by the
/// top-level driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub rest: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut preview: String = self.rest.chars().take(40).collect();
        if preview.len() < self.rest.len() {
            preview.push_str("...");
        }
        write!(f, "unconsumed input starting at {:?}", preview)
    }
}

impl std::error::Error for SyntaxError {}
