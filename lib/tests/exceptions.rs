mod common;

use common::*;
use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder, ClassConstantIndex};
use mocha::jvm::*;
use mocha::runtime::*;
use std::cell::RefCell;
use std::rc::Rc;

/// `(II)I` division, returning `-1` from a handler covering the division
fn add_guarded_division(
    class: &mut ClassBuilder,
    name: &str,
    catch_type: Option<&str>,
) -> Result<(), Error> {
    let catch_type = match catch_type {
        Some(catch_type) => Some(class.constants().get_class(catch_type)?),
        None => None,
    };
    let mut code = BytecodeWriter::new();
    code.op(opcode::ILOAD_0)
        .op(opcode::ILOAD_1)
        .op(opcode::IDIV)
        .op(opcode::IRETURN)
        .op(opcode::POP)
        .op(opcode::ICONST_M1)
        .op(opcode::IRETURN)
        .handler(0, 4, 4, catch_type);
    add_static(class, name, "(II)I", code.into_code(2, 2))
}

fn guard() -> Result<MemorySource, Error> {
    let mut class = new_class("Guard")?;
    add_guarded_division(&mut class, "exact", Some("java/lang/ArithmeticException"))?;
    add_guarded_division(&mut class, "general", Some("java/lang/RuntimeException"))?;
    add_guarded_division(&mut class, "unrelated", Some("java/lang/NullPointerException"))?;
    add_guarded_division(&mut class, "any", None)?;
    Ok(MemorySource::new().with("Guard", class.into_bytes()?))
}

#[test]
fn handlers_match_by_class() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, guard()?)?;
    let divide = |name: &str, divisor: i32| {
        call(&runtime, "Guard", name, "(II)I", vec![Value::Int(6), Value::Int(divisor)])
    };

    assert_eq!(returned_int(divide("exact", 3)?), 2);
    assert_eq!(returned_int(divide("exact", 0)?), -1);
    assert_eq!(returned_int(divide("general", 0)?), -1);
    assert_eq!(returned_int(divide("any", 0)?), -1);

    let completion = divide("unrelated", 0)?;
    assert_eq!(thrown_class(&completion), "java/lang/ArithmeticException");
    if let Completion::Threw(exception) = &completion {
        assert_eq!(runtime.describe_exception(exception), "java/lang/ArithmeticException: / by zero");
    }
    Ok(())
}

#[test]
fn unresolvable_catch_types() -> Result<(), Error> {
    let mut class = new_class("Missing")?;
    add_guarded_division(&mut class, "missing", Some("does/not/Exist"))?;

    // A second handler over the same range sees the resolution error, not the division
    let missing = class.constants().get_class("does/not/Exist")?;
    let linkage = class.constants().get_class("java/lang/LinkageError")?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::ICONST_1)
        .op(opcode::ICONST_0)
        .op(opcode::IDIV)
        .op(opcode::IRETURN)
        .op(opcode::POP)
        .op(opcode::ICONST_M1)
        .op(opcode::IRETURN)
        .op(opcode::POP)
        .op(opcode::ICONST_2)
        .op(opcode::IRETURN)
        .handler(0, 4, 4, Some(missing))
        .handler(0, 4, 7, Some(linkage));
    add_static(&mut class, "fallback", "()I", code.into_code(2, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Missing", class.into_bytes()?))?;
    let args = vec![Value::Int(6), Value::Int(0)];
    let completion = call(&runtime, "Missing", "missing", "(II)I", args)?;
    assert_eq!(thrown_class(&completion), "java/lang/NoClassDefFoundError");
    assert_eq!(returned_int(call(&runtime, "Missing", "fallback", "()I", vec![])?), 2);
    Ok(())
}

#[test]
fn exceptions_unwind_through_frames() -> Result<(), Error> {
    let mut class = new_class("Unwind")?;
    let mut inner = BytecodeWriter::new();
    inner
        .op(opcode::ICONST_1)
        .op(opcode::ICONST_0)
        .op(opcode::IDIV)
        .op(opcode::IRETURN);
    add_static(&mut class, "inner", "()I", inner.into_code(2, 0))?;

    let inner_ref = class.constants().get_method_ref("Unwind", "inner", "()I", false)?;
    let mut outer = BytecodeWriter::new();
    outer
        .op(opcode::INVOKESTATIC)
        .index(inner_ref)
        .op(opcode::IRETURN)
        .op(opcode::POP)
        .op(opcode::BIPUSH)
        .i8(99)
        .op(opcode::IRETURN)
        .handler(0, 3, 4, None);
    add_static(&mut class, "outer", "()I", outer.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Unwind", class.into_bytes()?))?;
    assert_eq!(returned_int(call(&runtime, "Unwind", "outer", "()I", vec![])?), 99);
    assert_eq!(
        thrown_class(&call(&runtime, "Unwind", "inner", "()I", vec![])?),
        "java/lang/ArithmeticException"
    );
    Ok(())
}

/// `fail()` throws `new IllegalArgumentException("bad")`, `recover()` catches it and returns
/// its message
fn thrower() -> Result<MemorySource, Error> {
    const ILLEGAL_ARGUMENT: &str = "java/lang/IllegalArgumentException";
    let mut class = new_class("Thrower")?;
    let exception = class.constants().get_class(ILLEGAL_ARGUMENT)?;
    let init = class.constants().get_method_ref(
        ILLEGAL_ARGUMENT,
        "<init>",
        "(Ljava/lang/String;)V",
        false,
    )?;
    let text = class.constants().get_utf8("bad")?;
    let message = class.constants().get_string(text)?;
    let get_message =
        class
            .constants()
            .get_method_ref(THROWABLE, "getMessage", "()Ljava/lang/String;", false)?;

    let throw = |code: &mut BytecodeWriter| {
        code.op(opcode::NEW)
            .index(exception)
            .op(opcode::DUP)
            .op(opcode::LDC_W)
            .index(message)
            .op(opcode::INVOKESPECIAL)
            .index(init)
            .op(opcode::ATHROW);
    };

    let mut fail = BytecodeWriter::new();
    throw(&mut fail);
    add_static(&mut class, "fail", "()V", fail.into_code(3, 0))?;

    let mut recover = BytecodeWriter::new();
    throw(&mut recover);
    let handler_pc = recover.pc();
    recover
        .op(opcode::INVOKEVIRTUAL)
        .index(get_message)
        .op(opcode::ARETURN)
        .handler(0, handler_pc, handler_pc, Some(exception));
    add_static(&mut class, "recover", "()Ljava/lang/String;", recover.into_code(3, 0))?;

    Ok(MemorySource::new().with("Thrower", class.into_bytes()?))
}

#[test]
fn thrown_exceptions_carry_their_message() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, thrower()?)?;

    let completion = call(&runtime, "Thrower", "fail", "()V", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/IllegalArgumentException");
    if let Completion::Threw(exception) = &completion {
        assert_eq!(runtime.exception_message(exception).as_deref(), Some("bad"));
    }

    let message = returned_object(call(&runtime, "Thrower", "recover", "()Ljava/lang/String;", vec![])?)
        .expect("message is set");
    assert_eq!(runtime.string_text(&message).as_deref(), Some("bad"));
    Ok(())
}

#[test]
fn null_references() -> Result<(), Error> {
    let mut class = new_class("Nulls")?;
    let mut throw = BytecodeWriter::new();
    throw.op(opcode::ACONST_NULL).op(opcode::ATHROW);
    add_static(&mut class, "throwNull", "()V", throw.into_code(1, 0))?;

    let hash_code = class.constants().get_method_ref(OBJECT, "hashCode", "()I", false)?;
    let mut hash = BytecodeWriter::new();
    hash.op(opcode::ACONST_NULL)
        .op(opcode::INVOKEVIRTUAL)
        .index(hash_code)
        .op(opcode::IRETURN);
    add_static(&mut class, "hash", "()I", hash.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Nulls", class.into_bytes()?))?;
    for (method, descriptor) in [("throwNull", "()V"), ("hash", "()I")] {
        let completion = call(&runtime, "Nulls", method, descriptor, vec![])?;
        assert_eq!(thrown_class(&completion), "java/lang/NullPointerException");
    }
    Ok(())
}

#[test]
fn casts_and_type_checks() -> Result<(), Error> {
    let mut class = new_class("Box")?;
    let text = class.constants().get_utf8("x")?;
    let string = class.constants().get_string(text)?;
    let this_class = class.constants().get_class("Box")?;
    let serializable = class.constants().get_class("java/io/Serializable")?;

    let mut cast = BytecodeWriter::new();
    cast.op(opcode::LDC_W)
        .index(string)
        .op(opcode::CHECKCAST)
        .index(this_class)
        .op(opcode::ARETURN);
    add_static(&mut class, "cast", "()Ljava/lang/Object;", cast.into_code(1, 0))?;

    let mut cast_null = BytecodeWriter::new();
    cast_null
        .op(opcode::ACONST_NULL)
        .op(opcode::CHECKCAST)
        .index(this_class)
        .op(opcode::ARETURN);
    add_static(&mut class, "castNull", "()Ljava/lang/Object;", cast_null.into_code(1, 0))?;

    let instance_of = |class: &mut ClassBuilder, name: &str, load_null: bool, target: ClassConstantIndex| {
        let mut code = BytecodeWriter::new();
        if load_null {
            code.op(opcode::ACONST_NULL);
        } else {
            code.op(opcode::LDC_W).index(string);
        }
        code.op(opcode::INSTANCEOF).index(target).op(opcode::IRETURN);
        add_static(class, name, "()I", code.into_code(1, 0))
    };
    instance_of(&mut class, "isSerializable", false, serializable)?;
    instance_of(&mut class, "isBox", false, this_class)?;
    instance_of(&mut class, "isNullSerializable", true, serializable)?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Box", class.into_bytes()?))?;

    let completion = call(&runtime, "Box", "cast", "()Ljava/lang/Object;", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/ClassCastException");
    if let Completion::Threw(exception) = &completion {
        assert_eq!(
            runtime.exception_message(exception).as_deref(),
            Some("class java/lang/String cannot be cast to class Box")
        );
    }
    assert!(returned_object(call(&runtime, "Box", "castNull", "()Ljava/lang/Object;", vec![])?).is_none());

    assert_eq!(returned_int(call(&runtime, "Box", "isSerializable", "()I", vec![])?), 1);
    assert_eq!(returned_int(call(&runtime, "Box", "isBox", "()I", vec![])?), 0);
    assert_eq!(returned_int(call(&runtime, "Box", "isNullSerializable", "()I", vec![])?), 0);
    Ok(())
}

#[test]
fn interfaces_cannot_be_instantiated() -> Result<(), Error> {
    let mut class = new_class("Factory")?;
    let cloneable = class.constants().get_class("java/lang/Cloneable")?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::NEW).index(cloneable).op(opcode::ARETURN);
    add_static(&mut class, "make", "()Ljava/lang/Object;", code.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Factory", class.into_bytes()?))?;
    let completion = call(&runtime, "Factory", "make", "()Ljava/lang/Object;", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/InstantiationError");
    Ok(())
}

#[test]
fn unbounded_recursion() -> Result<(), Error> {
    let mut class = new_class("Recursive")?;
    let recurse = class.constants().get_method_ref("Recursive", "recurse", "()V", false)?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::INVOKESTATIC).index(recurse).op(opcode::RETURN);
    add_static(&mut class, "recurse", "()V", code.into_code(0, 0))?;

    let overflow = class.constants().get_class("java/lang/StackOverflowError")?;
    let mut survive = BytecodeWriter::new();
    survive
        .op(opcode::INVOKESTATIC)
        .index(recurse)
        .op(opcode::ICONST_0)
        .op(opcode::IRETURN)
        .op(opcode::POP)
        .op(opcode::ICONST_1)
        .op(opcode::IRETURN)
        .handler(0, 3, 5, Some(overflow));
    add_static(&mut class, "survive", "()I", survive.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let mut runtime = runtime(&arenas, MemorySource::new().with("Recursive", class.into_bytes()?))?;
    runtime.settings.max_call_depth = 64;

    let completion = call(&runtime, "Recursive", "recurse", "()V", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/StackOverflowError");
    assert_eq!(returned_int(call(&runtime, "Recursive", "survive", "()I", vec![])?), 1);
    Ok(())
}

/// Uncaught exceptions, as `thread: description`
struct Recorder(Rc<RefCell<Vec<String>>>);

impl UncaughtExceptionHandler for Recorder {
    fn uncaught_exception<'g>(
        &self,
        runtime: &Runtime<'g>,
        thread: &Thread<'g>,
        exception: &ObjectRef<'g>,
    ) {
        let description = runtime.describe_exception(exception);
        self.0
            .borrow_mut()
            .push(format!("{}: {}", thread.name(), description));
    }
}

#[test]
fn uncaught_exception_hook() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let mut runtime = runtime(&arenas, guard()?)?;
    let seen = Rc::new(RefCell::new(vec![]));
    runtime.set_uncaught_handler(Box::new(Recorder(seen.clone())));

    let args = || vec![Value::Int(1), Value::Int(0)];
    call(&runtime, "Guard", "unrelated", "(II)I", args())?;
    call(&runtime, "Guard", "exact", "(II)I", args())?;

    let guard = runtime.load_class("Guard")?;
    let worker = runtime.spawn_call("worker", guard, "unrelated", "(II)I", args())?;
    runtime.run()?;
    let worker = runtime.take_finished(worker).expect("thread finished");
    assert!(matches!(runtime.completion_of(&worker)?, Completion::Threw(_)));

    assert_eq!(
        *seen.borrow(),
        vec![
            String::from("test: java/lang/ArithmeticException: / by zero"),
            String::from("worker: java/lang/ArithmeticException: / by zero"),
        ]
    );
    Ok(())
}
