use std::ops::Range;

/// Byte offsets into the source text, end exclusive.
pub type Span = Range<usize>;

/// A syntax node or token paired with where it came from.
pub type Spanned<T> = (T, Span);
