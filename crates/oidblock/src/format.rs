/// Default character used to left-pad identifiers.
pub const DEFAULT_PADDING_CHAR: char = '0';

/// Describes how a raw counter value is rendered as an external identifier:
/// `prefix + left_pad(value, length, padding_char)`.
///
/// A `length` of zero or less disables padding. Values whose decimal form is
/// already `length` characters or longer are never truncated.
///
/// # Example
/// ```
/// use oidblock::IdFormat;
///
/// let format = IdFormat::new(10).with_prefix("A:");
/// assert_eq!(format.format(500), "A:0000000500");
/// assert_eq!(IdFormat::default().format(500), "500");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "snake_case"))]
pub struct IdFormat {
    /// String prepended to every identifier.
    #[cfg_attr(feature = "serde", serde(rename = "id_prefix"))]
    pub prefix: Option<String>,
    /// Minimum width of the numeric part; `<= 0` disables padding.
    pub length: i32,
    /// Character used to fill the numeric part up to `length`.
    pub padding_char: char,
}

impl Default for IdFormat {
    fn default() -> Self {
        Self {
            prefix: None,
            length: 0,
            padding_char: DEFAULT_PADDING_CHAR,
        }
    }
}

impl IdFormat {
    /// Creates a format padding to `length` with [`DEFAULT_PADDING_CHAR`].
    pub fn new(length: i32) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    /// Disables padding.
    pub fn unpadded() -> Self {
        Self::new(0)
    }

    /// Sets the text prepended to every identifier.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the minimum width of the numeric part.
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    /// Sets the fill character.
    pub fn with_padding_char(mut self, padding_char: char) -> Self {
        self.padding_char = padding_char;
        self
    }

    /// Renders `value` according to this format.
    pub fn format(&self, value: i64) -> String {
        let digits = value.to_string();
        let prefix = self.prefix.as_deref().unwrap_or_default();
        let fill = usize::try_from(self.length)
            .unwrap_or(0)
            .saturating_sub(digits.chars().count());

        let mut out = String::with_capacity(prefix.len() + fill + digits.len());
        out.push_str(prefix);
        out.extend(core::iter::repeat_n(self.padding_char, fill));
        out.push_str(&digits);
        out
    }
}
