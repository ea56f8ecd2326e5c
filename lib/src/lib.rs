//! A small JVM-style runtime: class files are read and assembled by [`jvm`], loaded, linked, and
//! scheduled by [`runtime`], and executed by [`interpreter`].

pub mod interpreter;
pub mod jvm;
pub mod runtime;
mod util;

pub use jvm::Error;
