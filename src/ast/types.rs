use serde::{Deserialize, Serialize};

/// Records that own a `data()`/`size()` pair describing the same buffer.
pub const SIZED_CONTAINERS_OR_VIEWS: &[&str] = &[
    "span",
    "array",
    "vector",
    "basic_string_view",
    "basic_string",
    "initializer_list",
];

/// Canonical type of an expression or declaration, as reported by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    #[default]
    Void,
    Bool,
    Int {
        #[serde(default = "default_signed")]
        signed: bool,
        #[serde(default = "default_int_bytes")]
        bytes: u8,
    },
    Char {
        #[serde(default)]
        wide: bool,
        #[serde(default = "default_signed")]
        signed: bool,
    },
    Float {
        #[serde(default = "default_float_bytes")]
        bytes: u8,
    },
    Enum {
        name: String,
    },
    Pointer {
        pointee: Box<Type>,
        #[serde(default)]
        pointee_const: bool,
    },
    ConstantArray {
        element: Box<Type>,
        size: u64,
    },
    IncompleteArray {
        element: Box<Type>,
    },
    Reference {
        referee: Box<Type>,
    },
    Record {
        name: String,
        #[serde(default)]
        in_std: bool,
    },
    Function,
}

fn default_signed() -> bool {
    true
}

fn default_int_bytes() -> u8 {
    4
}

fn default_float_bytes() -> u8 {
    8
}

impl Type {
    pub fn int() -> Self {
        Type::Int {
            signed: true,
            bytes: 4,
        }
    }

    pub fn unsigned() -> Self {
        Type::Int {
            signed: false,
            bytes: 4,
        }
    }

    pub fn size_t() -> Self {
        Type::Int {
            signed: false,
            bytes: 8,
        }
    }

    pub fn long() -> Self {
        Type::Int {
            signed: true,
            bytes: 8,
        }
    }

    pub fn char() -> Self {
        Type::Char {
            wide: false,
            signed: true,
        }
    }

    pub fn wchar() -> Self {
        Type::Char {
            wide: true,
            signed: true,
        }
    }

    pub fn pointer_to(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Box::new(pointee),
            pointee_const: false,
        }
    }

    pub fn const_pointer_to(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Box::new(pointee),
            pointee_const: true,
        }
    }

    pub fn array_of(element: Type, size: u64) -> Self {
        Type::ConstantArray {
            element: Box::new(element),
            size,
        }
    }

    pub fn record(name: impl Into<String>) -> Self {
        Type::Record {
            name: name.into(),
            in_std: false,
        }
    }

    pub fn std_record(name: impl Into<String>) -> Self {
        Type::Record {
            name: name.into(),
            in_std: true,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::ConstantArray { .. } | Type::IncompleteArray { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Type::Enum { .. })
    }

    /// Integer in the C sense: `bool`, character and integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Bool | Type::Int { .. } | Type::Char { .. })
    }

    pub fn is_unsigned_integer(&self) -> bool {
        match self {
            Type::Bool => true,
            Type::Int { signed, .. } | Type::Char { signed, .. } => !signed,
            _ => false,
        }
    }

    pub fn is_signed_integer(&self) -> bool {
        match self {
            Type::Int { signed, .. } | Type::Char { signed, .. } => *signed,
            _ => false,
        }
    }

    /// Narrow character type (`char`, `signed char`, `unsigned char`).
    pub fn is_char(&self) -> bool {
        matches!(self, Type::Char { wide: false, .. })
    }

    pub fn is_wide_char(&self) -> bool {
        matches!(self, Type::Char { wide: true, .. })
    }

    pub fn is_any_char(&self) -> bool {
        matches!(self, Type::Char { .. })
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    pub fn pointee_is_const(&self) -> bool {
        matches!(
            self,
            Type::Pointer {
                pointee_const: true,
                ..
            }
        )
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::ConstantArray { element, .. } | Type::IncompleteArray { element } => {
                Some(element)
            }
            _ => None,
        }
    }

    pub fn constant_array_size(&self) -> Option<u64> {
        match self {
            Type::ConstantArray { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// The type a subscript or dereference of a value of this type yields.
    pub fn accessed_element(&self) -> Type {
        self.pointee()
            .or_else(|| self.element())
            .cloned()
            .unwrap_or_default()
    }

    /// Array-to-pointer decay; other types are returned unchanged.
    pub fn decayed(&self) -> Type {
        match self.element() {
            Some(element) => Type::pointer_to(element.clone()),
            None => self.clone(),
        }
    }

    pub fn is_file_record(&self) -> bool {
        matches!(self, Type::Record { name, .. } if name == "FILE" || name == "_IO_FILE")
    }

    /// Storage size in bytes for complete object types.
    pub fn size_in_chars(&self) -> Option<u64> {
        match self {
            Type::Bool => Some(1),
            Type::Char { wide: false, .. } => Some(1),
            Type::Char { wide: true, .. } => Some(4),
            Type::Int { bytes, .. } | Type::Float { bytes } => Some(u64::from(*bytes)),
            Type::Enum { .. } => Some(4),
            Type::Pointer { .. } => Some(8),
            Type::ConstantArray { element, size } => {
                element.size_in_chars().map(|elem| elem.saturating_mul(*size))
            }
            _ => None,
        }
    }

    /// Spelling used when the declaration text cannot be reused.
    pub fn spelling(&self) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int { signed, bytes } => {
                let base = match bytes {
                    1 => "char",
                    2 => "short",
                    8 => "long long",
                    _ => "int",
                };
                if *signed {
                    base.to_string()
                } else {
                    format!("unsigned {base}")
                }
            }
            Type::Char { wide: true, .. } => "wchar_t".to_string(),
            Type::Char { signed: true, .. } => "char".to_string(),
            Type::Char { signed: false, .. } => "unsigned char".to_string(),
            Type::Float { bytes: 4 } => "float".to_string(),
            Type::Float { .. } => "double".to_string(),
            Type::Enum { name } => name.clone(),
            Type::Pointer {
                pointee,
                pointee_const,
            } => {
                if *pointee_const {
                    format!("const {} *", pointee.spelling())
                } else {
                    format!("{} *", pointee.spelling())
                }
            }
            Type::ConstantArray { element, size } => format!("{}[{size}]", element.spelling()),
            Type::IncompleteArray { element } => format!("{}[]", element.spelling()),
            Type::Reference { referee } => format!("{} &", referee.spelling()),
            Type::Record { name, in_std } => {
                if *in_std {
                    format!("std::{name}")
                } else {
                    name.clone()
                }
            }
            Type::Function => "<function>".to_string(),
        }
    }
}

/// Record a member function belongs to, e.g. `std::span` for `s.data()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub name: String,
    #[serde(default)]
    pub in_std: bool,
}

impl RecordRef {
    pub fn std(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_std: true,
        }
    }

    /// `std::span`, `std::vector` and the other sized containers or views.
    pub fn is_sized_container_or_view(&self) -> bool {
        self.in_std && SIZED_CONTAINERS_OR_VIEWS.contains(&self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_pointer_queries() {
        let ty = Type::const_pointer_to(Type::char());
        assert!(ty.is_pointer());
        assert!(ty.pointee_is_const());
        assert!(ty.pointee().is_some_and(Type::is_char));
        assert!(!ty.pointee().is_some_and(Type::is_wide_char));
    }

    #[test]
    fn array_decays_to_element_pointer() {
        let arr = Type::array_of(Type::int(), 10);
        assert_eq!(arr.constant_array_size(), Some(10));
        assert_eq!(arr.decayed(), Type::pointer_to(Type::int()));
        assert_eq!(arr.accessed_element(), Type::int());
        assert_eq!(arr.size_in_chars(), Some(40));
    }

    #[test]
    fn integer_classification() {
        assert!(Type::Bool.is_unsigned_integer());
        assert!(Type::size_t().is_unsigned_integer());
        assert!(Type::int().is_signed_integer());
        assert!(!Type::Enum { name: "E".into() }.is_integer());
        assert!(!Type::pointer_to(Type::int()).is_integer());
    }

    #[test]
    fn sized_container_records() {
        assert!(RecordRef::std("vector").is_sized_container_or_view());
        assert!(!RecordRef::std("list").is_sized_container_or_view());
        assert!(
            !RecordRef {
                name: "span".into(),
                in_std: false
            }
            .is_sized_container_or_view()
        );
    }

    #[test]
    fn spellings() {
        assert_eq!(Type::unsigned().spelling(), "unsigned int");
        assert_eq!(Type::std_record("string").spelling(), "std::string");
        assert_eq!(
            Type::const_pointer_to(Type::char()).spelling(),
            "const char *"
        );
    }
}
