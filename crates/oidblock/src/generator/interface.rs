use crate::{IdFormat, Result};

/// Anything that hands out the next value of one identifier sequence.
///
/// Implementations must be safe to share between threads: a registry holds
/// producers behind an [`Arc`](std::sync::Arc) and calls them from whichever
/// thread asks.
pub trait IdentifierProducer: Send + Sync {
    /// Returns the next raw counter value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be produced (e.g. the backing
    /// database is unreachable). A failed call leaves the sequence untouched.
    fn next_identifier(&self) -> Result<i64>;

    /// How values of this sequence are rendered.
    fn id_format(&self) -> &IdFormat;

    /// Returns the next value rendered with [`Self::id_format`].
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::next_identifier`].
    fn new_identifier(&self) -> Result<String> {
        let id = self.next_identifier()?;
        Ok(self.id_format().format(id))
    }
}
