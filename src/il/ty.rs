use std::fmt;

// ─── Type lattice ───────────────────────────────────────────────────────────

/// The type of an IR value: exactly one element kind plus optional `list` and
/// `output` wrappers, packed as a bit set.
///
/// Because `list` and `output` are independent flags, `output<list<T>>` and
/// `list<output<T>>` denote the same value; outputs are always the outermost
/// wrapper when the type is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type(u8);

const KIND_MASK: u8 = 0b0001_1111;
const FLAG_LIST: u8 = 1 << 5;
const FLAG_OUTPUT: u8 = 1 << 6;

impl Type {
    pub const UNKNOWN: Type = Type(1);
    pub const BOOL: Type = Type(1 << 1);
    pub const NUMBER: Type = Type(1 << 2);
    pub const STRING: Type = Type(1 << 3);
    pub const MAP: Type = Type(1 << 4);

    /// The element kind with both wrappers stripped.
    pub fn element_type(self) -> Type {
        Type(self.0 & KIND_MASK)
    }

    pub fn is_list(self) -> bool {
        self.0 & FLAG_LIST != 0
    }

    /// Wrap in a list. Wrapping a list again is a no-op.
    pub fn list_of(self) -> Type {
        Type(self.0 | FLAG_LIST)
    }

    pub fn is_output(self) -> bool {
        self.0 & FLAG_OUTPUT != 0
    }

    /// Wrap in an output. Applying this to a list yields an output-of-list;
    /// `list<output<T>>` is not representable by design.
    pub fn output_of(self) -> Type {
        Type(self.0 | FLAG_OUTPUT)
    }

    /// Drop the output wrapper, keeping the list wrapper if present.
    pub fn strip_output(self) -> Type {
        Type(self.0 & !FLAG_OUTPUT)
    }

    /// True for the bool/number/string triple that coercions operate on.
    pub fn is_scalar(self) -> bool {
        matches!(self.element_type(), Type::BOOL | Type::NUMBER | Type::STRING)
            && !self.is_list()
            && !self.is_output()
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::UNKNOWN
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_output() {
            write!(f, "output<{}>", self.strip_output())
        } else if self.is_list() {
            write!(f, "list<{}>", self.element_type())
        } else {
            match self.element_type() {
                Type::BOOL => write!(f, "bool"),
                Type::NUMBER => write!(f, "number"),
                Type::STRING => write!(f, "string"),
                Type::MAP => write!(f, "map"),
                _ => write!(f, "unknown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_strips_both_wrappers() {
        let t = Type::STRING.list_of().output_of();
        assert_eq!(t.element_type(), Type::STRING);
        assert!(!t.element_type().is_list());
        assert!(!t.element_type().is_output());
    }

    #[test]
    fn output_of_list_keeps_single_representation() {
        let a = Type::NUMBER.list_of().output_of();
        let b = Type::NUMBER.output_of().list_of();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Type::BOOL.output_of(), Type::BOOL.output_of());
        assert_ne!(Type::BOOL, Type::BOOL.output_of());
        assert_ne!(Type::STRING.list_of(), Type::STRING);
    }

    #[test]
    fn display_renders_outermost_output() {
        assert_eq!(Type::STRING.list_of().output_of().to_string(), "output<list<string>>");
        assert_eq!(Type::MAP.to_string(), "map");
        assert_eq!(Type::UNKNOWN.list_of().to_string(), "list<unknown>");
    }

    #[test]
    fn scalar_predicate_excludes_wrappers() {
        assert!(Type::NUMBER.is_scalar());
        assert!(!Type::NUMBER.list_of().is_scalar());
        assert!(!Type::STRING.output_of().is_scalar());
        assert!(!Type::MAP.is_scalar());
        assert!(!Type::UNKNOWN.is_scalar());
    }
}
