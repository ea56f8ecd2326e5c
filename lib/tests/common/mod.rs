//! Shared helpers for the integration tests: a tiny `java/lang` assembled on the fly, plus
//! shortcuts for building classes and calling into them.

#![allow(dead_code)]

use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder, Code};
use mocha::jvm::*;
use mocha::runtime::*;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";
pub const THROWABLE: &str = "java/lang/Throwable";

/// Throwable classes of the bootstrap library, with their superclass
const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Exception", THROWABLE),
    ("java/lang/Error", THROWABLE),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/CloneNotSupportedException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    ("java/lang/StackOverflowError", "java/lang/Error"),
    ("java/lang/OutOfMemoryError", "java/lang/Error"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/BootstrapMethodError", "java/lang/LinkageError"),
    ("java/lang/ClassCircularityError", "java/lang/LinkageError"),
    ("java/lang/ClassFormatError", "java/lang/LinkageError"),
    ("java/lang/ExceptionInInitializerError", "java/lang/LinkageError"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/AbstractMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/IllegalAccessError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/InstantiationError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
];

pub fn public_class() -> ClassAccessFlags {
    ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER
}

pub fn public_static() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
}

/// Public class extending `java/lang/Object`
pub fn new_class(name: &str) -> Result<ClassBuilder, Error> {
    ClassBuilder::new(name, Some(OBJECT), public_class())
}

/// Public no-argument constructor which only calls the superclass constructor
pub fn add_default_constructor(class: &mut ClassBuilder, super_class: &str) -> Result<(), Error> {
    let super_init = class
        .constants()
        .get_method_ref(super_class, "<init>", "()V", false)?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::ALOAD_0)
        .op(opcode::INVOKESPECIAL)
        .index(super_init)
        .op(opcode::RETURN);
    class.add_method(MethodAccessFlags::PUBLIC, "<init>", "()V", Some(code.into_code(1, 1)))
}

/// Public constructor taking a message, passed on to the superclass constructor
fn add_message_constructor(class: &mut ClassBuilder, super_class: &str) -> Result<(), Error> {
    let super_init = class.constants().get_method_ref(
        super_class,
        "<init>",
        "(Ljava/lang/String;)V",
        false,
    )?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::ALOAD_0)
        .op(opcode::ALOAD_1)
        .op(opcode::INVOKESPECIAL)
        .index(super_init)
        .op(opcode::RETURN);
    class.add_method(
        MethodAccessFlags::PUBLIC,
        "<init>",
        "(Ljava/lang/String;)V",
        Some(code.into_code(2, 2)),
    )
}

fn object_class() -> Result<Vec<u8>, Error> {
    let mut object = ClassBuilder::new(OBJECT, None, public_class())?;
    let native = MethodAccessFlags::PUBLIC | MethodAccessFlags::NATIVE;
    let final_native = native | MethodAccessFlags::FINAL;
    object.add_method(
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::NATIVE,
        "registerNatives",
        "()V",
        None,
    )?;
    object.add_method(native, "hashCode", "()I", None)?;
    object.add_method(final_native, "getClass", "()Ljava/lang/Class;", None)?;
    object.add_method(
        MethodAccessFlags::PROTECTED | MethodAccessFlags::NATIVE,
        "clone",
        "()Ljava/lang/Object;",
        None,
    )?;
    object.add_method(final_native, "wait", "(J)V", None)?;
    object.add_method(final_native, "notify", "()V", None)?;
    object.add_method(final_native, "notifyAll", "()V", None)?;

    let mut init = BytecodeWriter::new();
    init.op(opcode::RETURN);
    object.add_method(MethodAccessFlags::PUBLIC, "<init>", "()V", Some(init.into_code(0, 1)))?;

    let register = object
        .constants()
        .get_method_ref(OBJECT, "registerNatives", "()V", false)?;
    let mut clinit = BytecodeWriter::new();
    clinit
        .op(opcode::INVOKESTATIC)
        .index(register)
        .op(opcode::RETURN);
    object.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V", Some(clinit.into_code(0, 0)))?;

    let wait = object.constants().get_method_ref(OBJECT, "wait", "(J)V", false)?;
    let mut wait_forever = BytecodeWriter::new();
    wait_forever
        .op(opcode::ALOAD_0)
        .op(opcode::LCONST_0)
        .op(opcode::INVOKEVIRTUAL)
        .index(wait)
        .op(opcode::RETURN);
    object.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL,
        "wait",
        "()V",
        Some(wait_forever.into_code(3, 1)),
    )?;

    object.into_bytes()
}

fn throwable_class() -> Result<Vec<u8>, Error> {
    let mut throwable = new_class(THROWABLE)?;
    throwable.add_interface("java/io/Serializable")?;
    throwable.add_field(FieldAccessFlags::PRIVATE, "detailMessage", "Ljava/lang/String;")?;
    throwable.add_field(FieldAccessFlags::PRIVATE, "cause", "Ljava/lang/Throwable;")?;
    add_default_constructor(&mut throwable, OBJECT)?;

    let object_init = throwable.constants().get_method_ref(OBJECT, "<init>", "()V", false)?;
    let message = throwable
        .constants()
        .get_field_ref(THROWABLE, "detailMessage", "Ljava/lang/String;")?;
    let mut init = BytecodeWriter::new();
    init.op(opcode::ALOAD_0)
        .op(opcode::INVOKESPECIAL)
        .index(object_init)
        .op(opcode::ALOAD_0)
        .op(opcode::ALOAD_1)
        .op(opcode::PUTFIELD)
        .index(message)
        .op(opcode::RETURN);
    throwable.add_method(
        MethodAccessFlags::PUBLIC,
        "<init>",
        "(Ljava/lang/String;)V",
        Some(init.into_code(2, 2)),
    )?;

    let mut get_message = BytecodeWriter::new();
    get_message
        .op(opcode::ALOAD_0)
        .op(opcode::GETFIELD)
        .index(message)
        .op(opcode::ARETURN);
    throwable.add_method(
        MethodAccessFlags::PUBLIC,
        "getMessage",
        "()Ljava/lang/String;",
        Some(get_message.into_code(1, 1)),
    )?;
    throwable.into_bytes()
}

fn interface(name: &str) -> Result<Vec<u8>, Error> {
    ClassBuilder::new(
        name,
        Some(OBJECT),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
    )?
    .into_bytes()
}

/// Bootstrap classes: `Object`, `String`, `Class`, the array interfaces, and the throwables
pub fn boot_classes() -> Result<MemorySource, Error> {
    let mut source = MemorySource::new()
        .with(OBJECT, object_class()?)
        .with(THROWABLE, throwable_class()?)
        .with("java/lang/Cloneable", interface("java/lang/Cloneable")?)
        .with("java/io/Serializable", interface("java/io/Serializable")?);

    let mut string = ClassBuilder::new(
        STRING,
        Some(OBJECT),
        public_class() | ClassAccessFlags::FINAL,
    )?;
    string.add_interface("java/io/Serializable")?;
    string.add_field(FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL, "value", "[C")?;
    source.insert(STRING, string.into_bytes()?);

    let class = ClassBuilder::new(
        "java/lang/Class",
        Some(OBJECT),
        public_class() | ClassAccessFlags::FINAL,
    )?;
    source.insert("java/lang/Class", class.into_bytes()?);

    for (name, super_class) in THROWABLES {
        let mut throwable = ClassBuilder::new(name, Some(*super_class), public_class())?;
        add_default_constructor(&mut throwable, super_class)?;
        add_message_constructor(&mut throwable, super_class)?;
        source.insert(*name, throwable.into_bytes()?);
    }
    Ok(source)
}

/// Runtime over the bootstrap library and some application classes
pub fn runtime<'g>(arenas: &'g ClassArenas<'g>, app: MemorySource) -> Result<Runtime<'g>, Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    Ok(Runtime::new(
        arenas,
        Settings::default(),
        Box::new(boot_classes()?),
        Box::new(app),
    ))
}

/// Add a `public static` method
pub fn add_static(
    class: &mut ClassBuilder,
    name: &str,
    descriptor: &str,
    code: Code,
) -> Result<(), Error> {
    class.add_method(public_static(), name, descriptor, Some(code))
}

/// Call a static method of an application class on a fresh thread
pub fn call<'g>(
    runtime: &Runtime<'g>,
    class_name: &str,
    method: &str,
    descriptor: &str,
    args: Vec<Value<'g>>,
) -> Result<Completion<'g>, Error> {
    let class = runtime.load_class(class_name)?;
    let mut thread = runtime.new_thread("test");
    runtime.call_static(&mut thread, class, method, descriptor, args)
}

pub fn returned_int(completion: Completion<'_>) -> i32 {
    match completion {
        Completion::Returned(Some(Value::Int(int))) => int,
        other => panic!("expected an int return, got {:?}", other),
    }
}

pub fn returned_long(completion: Completion<'_>) -> i64 {
    match completion {
        Completion::Returned(Some(Value::Long(long))) => long,
        other => panic!("expected a long return, got {:?}", other),
    }
}

pub fn returned_object<'g>(completion: Completion<'g>) -> Option<ObjectRef<'g>> {
    match completion {
        Completion::Returned(Some(Value::Object(object))) => Some(object),
        Completion::Returned(Some(Value::Null)) => None,
        other => panic!("expected a reference return, got {:?}", other),
    }
}

/// Class name of an uncaught exception
pub fn thrown_class(completion: &Completion<'_>) -> String {
    match completion {
        Completion::Threw(exception) => exception.class.name.to_string(),
        other => panic!("expected an exception, got {:?}", other),
    }
}
