use super::BinaryName;
use std::fmt;

/// Errors from reading, loading, linking, and running classes
///
/// Everything except `IoError`, `Internal`, and `Deadlock` has a counterpart guest exception (see
/// [`Error::guest_class`]) which is what running bytecode observes when the error happens while
/// resolving one of its constants.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Malformed class file bytes, descriptor, or constant pool
    Format(String),

    /// No loader in the delegation chain could find the class
    ClassNotFound(String),

    /// Duplicate definition, or a super type which doesn't fit (eg. a final superclass)
    Linkage(String),

    /// A class is its own superclass or superinterface
    ClassCircularity(String),

    /// Access-flag or package violation
    IllegalAccess(String),

    NoSuchMethod(String),
    NoSuchField(String),

    /// Method selection found only an abstract method
    AbstractMethod(String),

    /// Eg. `invokestatic` on an instance method, or conflicting default methods
    IncompatibleClassChange(String),

    /// Interpreter state that verified bytecode could never produce
    ///
    /// This is not recoverable and is never surfaced to guest code.
    Internal(String),

    /// No thread can run and nothing will ever wake one up (names of the stuck threads)
    Deadlock(Vec<String>),
}

impl Error {
    /// Guest exception class that should be raised for this error inside running bytecode
    pub fn guest_class(&self) -> Option<BinaryName> {
        match self {
            Error::Format(_) => Some(BinaryName::CLASSFORMATERROR),
            Error::ClassNotFound(_) => Some(BinaryName::NOCLASSDEFFOUNDERROR),
            Error::Linkage(_) => Some(BinaryName::LINKAGEERROR),
            Error::ClassCircularity(_) => Some(BinaryName::CLASSCIRCULARITYERROR),
            Error::IllegalAccess(_) => Some(BinaryName::ILLEGALACCESSERROR),
            Error::NoSuchMethod(_) => Some(BinaryName::NOSUCHMETHODERROR),
            Error::NoSuchField(_) => Some(BinaryName::NOSUCHFIELDERROR),
            Error::AbstractMethod(_) => Some(BinaryName::ABSTRACTMETHODERROR),
            Error::IncompatibleClassChange(_) => Some(BinaryName::INCOMPATIBLECLASSCHANGEERROR),
            Error::IoError(_) | Error::Internal(_) | Error::Deadlock(_) => None,
        }
    }

    /// Message attached to the guest exception
    pub fn message(&self) -> String {
        match self {
            Error::IoError(err) => err.to_string(),
            Error::Format(msg)
            | Error::ClassNotFound(msg)
            | Error::Linkage(msg)
            | Error::ClassCircularity(msg)
            | Error::IllegalAccess(msg)
            | Error::NoSuchMethod(msg)
            | Error::NoSuchField(msg)
            | Error::AbstractMethod(msg)
            | Error::IncompatibleClassChange(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Deadlock(threads) => format!("no runnable threads among {:?}", threads),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.guest_class() {
            Some(class) => write!(f, "{}: {}", class, self.message()),
            None => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for Error {}
