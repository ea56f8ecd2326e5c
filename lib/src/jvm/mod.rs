//! Read and write JVM classes
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Answer {
//!     public static int get() {
//!         return 42;
//!     }
//! }
//! ```
//!
//! Assembling an analogous class file and reading it back can be done as follows:
//!
//! ```
//! use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder, ClassFile, Code};
//! use mocha::jvm::*;
//!
//! # fn assemble_class() -> Result<(), Error> {
//! let mut class = ClassBuilder::new(
//!     "me/example/Answer",
//!     Some("java/lang/Object"),
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! )?;
//!
//! let mut code = BytecodeWriter::new();
//! code.op(opcode::BIPUSH).i8(42);
//! code.op(opcode::IRETURN);
//! class.add_method(
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     "get",
//!     "()I",
//!     Some(code.into_code(1, 0)),
//! )?;
//! let bytes: Vec<u8> = class.into_bytes()?;
//!
//! // Parsing only checks the structure, constants are resolved later by the runtime
//! let class_file = ClassFile::parse(&bytes)?;
//! assert_eq!(class_file.class_name(class_file.this_class)?, "me/example/Answer");
//! let body: Code = class_file
//!     .decode_attribute(&class_file.methods[0].attributes)?
//!     .unwrap();
//! assert_eq!(body.code_array, vec![opcode::BIPUSH, 42, opcode::IRETURN]);
//! # Ok(())
//! # }
//! # assemble_class().unwrap();
//! ```

mod access_flags;
pub mod class_file;
mod descriptors;
mod errors;
mod names;
pub mod opcode;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
