use super::{FieldType, ParseDescriptor};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces
///
/// Array classes are named by their descriptor (eg. `[[Ljava/lang/String;`), the same way they
/// appear in `CONSTANT_Class_info` entries.
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else if name.starts_with('[') {
            FieldType::<BinaryName>::parse(name)
                .map(|_| ())
                .map_err(|err| format!("Array class name '{}' is malformed: {:?}", name, err))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = UnqualifiedName(Cow::Borrowed("<init>"));
    pub const CLINIT: Self = UnqualifiedName(Cow::Borrowed("<clinit>"));

    // JDK names
    pub const MAIN: Self = Self::name("main");
    pub const VALUE: Self = Self::name("value");
    pub const DETAILMESSAGE: Self = Self::name("detailMessage");
    pub const CAUSE: Self = Self::name("cause");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Is this the name of an array class?
    pub fn is_array(&self) -> bool {
        self.as_str().starts_with('[')
    }

    /// Package part of the name (everything before the last `/`, empty for the unnamed package)
    ///
    /// Arrays live in the package of their element type and primitive arrays in the unnamed one.
    pub fn package(&self) -> &str {
        let name = self.as_str().trim_start_matches('[');
        let name = match name.strip_prefix('L') {
            Some(element) if self.is_array() => element.trim_end_matches(';'),
            _ if self.is_array() => "",
            _ => name,
        };
        match name.rfind('/') {
            Some(idx) => &name[..idx],
            None => "",
        }
    }

    // JDK names
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const ERROR: Self = Self::name("java/lang/Error");

    // Exceptions raised by the interpreter itself
    pub const ABSTRACTMETHODERROR: Self = Self::name("java/lang/AbstractMethodError");
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const ARRAYINDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/ArrayIndexOutOfBoundsException");
    pub const ARRAYSTOREEXCEPTION: Self = Self::name("java/lang/ArrayStoreException");
    pub const BOOTSTRAPMETHODERROR: Self = Self::name("java/lang/BootstrapMethodError");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const CLASSCIRCULARITYERROR: Self = Self::name("java/lang/ClassCircularityError");
    pub const CLASSFORMATERROR: Self = Self::name("java/lang/ClassFormatError");
    pub const CLONENOTSUPPORTEDEXCEPTION: Self =
        Self::name("java/lang/CloneNotSupportedException");
    pub const EXCEPTIONININITIALIZERERROR: Self =
        Self::name("java/lang/ExceptionInInitializerError");
    pub const ILLEGALACCESSERROR: Self = Self::name("java/lang/IllegalAccessError");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALMONITORSTATEEXCEPTION: Self =
        Self::name("java/lang/IllegalMonitorStateException");
    pub const INCOMPATIBLECLASSCHANGEERROR: Self =
        Self::name("java/lang/IncompatibleClassChangeError");
    pub const INSTANTIATIONERROR: Self = Self::name("java/lang/InstantiationError");
    pub const LINKAGEERROR: Self = Self::name("java/lang/LinkageError");
    pub const NEGATIVEARRAYSIZEEXCEPTION: Self =
        Self::name("java/lang/NegativeArraySizeException");
    pub const NOCLASSDEFFOUNDERROR: Self = Self::name("java/lang/NoClassDefFoundError");
    pub const NOSUCHFIELDERROR: Self = Self::name("java/lang/NoSuchFieldError");
    pub const NOSUCHMETHODERROR: Self = Self::name("java/lang/NoSuchMethodError");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const OUTOFMEMORYERROR: Self = Self::name("java/lang/OutOfMemoryError");
    pub const STACKOVERFLOWERROR: Self = Self::name("java/lang/StackOverflowError");
    pub const UNSATISFIEDLINKERROR: Self = Self::name("java/lang/UnsatisfiedLinkError");
    pub const UNSUPPORTEDOPERATIONEXCEPTION: Self =
        Self::name("java/lang/UnsupportedOperationException");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn package_names() {
        let name = |s: &str| BinaryName::from_string(s.to_owned()).unwrap();

        assert_eq!(name("java/lang/Object").package(), "java/lang");
        assert_eq!(name("Test").package(), "");
        assert_eq!(name("[[Ljava/util/List;").package(), "java/util");
        assert_eq!(name("[I").package(), "");
    }

    #[test]
    fn array_names_must_be_descriptors() {
        assert!(BinaryName::check_valid("[[I").is_ok());
        assert!(BinaryName::check_valid("[Lfoo/Bar;").is_ok());
        assert!(BinaryName::check_valid("[Lfoo/Bar").is_err());
        assert!(BinaryName::check_valid("foo/[Bar").is_err());
        assert!(BinaryName::check_valid("").is_err());
    }
}
