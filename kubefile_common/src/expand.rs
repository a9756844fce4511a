//! Placeholder expansion, as seen from the conversion code.

use crate::Result;

/// Something which can expand the placeholders in a file's content.
///
/// An expander may replace a placeholder with plain text, or with an encoded
/// [`SecretRef`](crate::secret::SecretRef) when the placeholder names a
/// secret value.
pub trait Expander {
    /// Expand all placeholders in `raw`.
    fn expand(&self, raw: &str) -> Result<String>;
}

impl<F> Expander for F
where
    F: Fn(&str) -> Result<String>,
{
    fn expand(&self, raw: &str) -> Result<String> {
        self(raw)
    }
}

#[test]
fn closures_are_expanders() {
    let upper = |s: &str| -> Result<String> { Ok(s.to_uppercase()) };
    let expander: &dyn Expander = &upper;
    assert_eq!(expander.expand("abc").unwrap(), "ABC");
}
