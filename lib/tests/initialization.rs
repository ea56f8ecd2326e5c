mod common;

use common::*;
use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder};
use mocha::jvm::*;
use mocha::runtime::*;

/// `<clinit>` which appends a digit to `Log.trace`
fn add_logging_initializer(class: &mut ClassBuilder, digit: i8) -> Result<(), Error> {
    let trace = class.constants().get_field_ref("Log", "trace", "I")?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::GETSTATIC)
        .index(trace)
        .op(opcode::BIPUSH)
        .i8(10)
        .op(opcode::IMUL)
        .op(opcode::BIPUSH)
        .i8(digit)
        .op(opcode::IADD)
        .op(opcode::PUTSTATIC)
        .index(trace)
        .op(opcode::RETURN);
    class.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V", Some(code.into_code(2, 0)))
}

fn hierarchy() -> Result<MemorySource, Error> {
    let mut log = new_class("Log")?;
    log.add_field(FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC, "trace", "I")?;

    let mut base = new_class("Base")?;
    add_logging_initializer(&mut base, 1)?;

    let mut derived = ClassBuilder::new("Derived", Some("Base"), public_class())?;
    add_logging_initializer(&mut derived, 2)?;
    let trace = derived.constants().get_field_ref("Log", "trace", "I")?;
    let mut get = BytecodeWriter::new();
    get.op(opcode::GETSTATIC).index(trace).op(opcode::IRETURN);
    add_static(&mut derived, "trace", "()I", get.into_code(1, 0))?;

    Ok(MemorySource::new()
        .with("Log", log.into_bytes()?)
        .with("Base", base.into_bytes()?)
        .with("Derived", derived.into_bytes()?))
}

#[test]
fn superclass_initializes_first() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, hierarchy()?)?;
    let base = runtime.load_class("Base")?;
    let derived = runtime.load_class("Derived")?;
    assert_eq!(base.init_state(), InitState::Linked);
    assert_eq!(derived.init_state(), InitState::Linked);

    assert_eq!(returned_int(call(&runtime, "Derived", "trace", "()I", vec![])?), 12);
    assert_eq!(base.init_state(), InitState::Initialized);
    assert_eq!(derived.init_state(), InitState::Initialized);
    assert_eq!(
        runtime.load_class(OBJECT)?.init_state(),
        InitState::Initialized
    );

    // Initializers never run twice
    assert_eq!(returned_int(call(&runtime, "Derived", "trace", "()I", vec![])?), 12);
    let mut thread = runtime.new_thread("again");
    assert!(matches!(
        runtime.initialize_class(&mut thread, derived)?,
        Completion::Returned(None)
    ));
    assert_eq!(returned_int(call(&runtime, "Derived", "trace", "()I", vec![])?), 12);
    Ok(())
}

#[test]
fn initializing_a_superclass_alone() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, hierarchy()?)?;
    let base = runtime.load_class("Base")?;
    let mut thread = runtime.new_thread("init");
    runtime.initialize_class(&mut thread, base)?;

    assert_eq!(base.init_state(), InitState::Initialized);
    assert_eq!(runtime.load_class("Derived")?.init_state(), InitState::Linked);
    assert_eq!(returned_int(call(&runtime, "Derived", "trace", "()I", vec![])?), 12);
    Ok(())
}

/// Class whose `<clinit>` is written by `throw`, plus a static `get()I`
fn failing_initializer(
    class_name: &str,
    throw: impl FnOnce(&mut ClassBuilder, &mut BytecodeWriter) -> Result<(), Error>,
) -> Result<MemorySource, Error> {
    let mut class = new_class(class_name)?;
    let mut clinit = BytecodeWriter::new();
    throw(&mut class, &mut clinit)?;
    class.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V", Some(clinit.into_code(2, 0)))?;

    let mut get = BytecodeWriter::new();
    get.op(opcode::ICONST_1).op(opcode::IRETURN);
    add_static(&mut class, "get", "()I", get.into_code(1, 0))?;
    Ok(MemorySource::new().with(class_name, class.into_bytes()?))
}

#[test]
fn failed_initialization_is_permanent() -> Result<(), Error> {
    let source = failing_initializer("Bad", |_, code| {
        code.op(opcode::ICONST_1)
            .op(opcode::ICONST_0)
            .op(opcode::IDIV)
            .op(opcode::POP)
            .op(opcode::RETURN);
        Ok(())
    })?;
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, source)?;

    let completion = call(&runtime, "Bad", "get", "()I", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/ExceptionInInitializerError");
    if let Completion::Threw(exception) = &completion {
        let cause = exception
            .class
            .resolve_field("cause", "Ljava/lang/Throwable;")?;
        match exception.get_field(cause.slot)? {
            Value::Object(cause) => {
                assert_eq!(cause.class.name.as_str(), "java/lang/ArithmeticException")
            }
            other => panic!("expected a cause, got {:?}", other),
        }
    }
    assert_eq!(runtime.load_class("Bad")?.init_state(), InitState::Erroneous);

    let completion = call(&runtime, "Bad", "get", "()I", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/NoClassDefFoundError");
    if let Completion::Threw(exception) = &completion {
        assert_eq!(
            runtime.exception_message(exception).as_deref(),
            Some("Could not initialize class Bad")
        );
    }
    Ok(())
}

#[test]
fn errors_from_initializers_are_not_wrapped() -> Result<(), Error> {
    let source = failing_initializer("Deep", |class, code| {
        let error = class.constants().get_class("java/lang/StackOverflowError")?;
        let init = class
            .constants()
            .get_method_ref("java/lang/StackOverflowError", "<init>", "()V", false)?;
        code.op(opcode::NEW)
            .index(error)
            .op(opcode::DUP)
            .op(opcode::INVOKESPECIAL)
            .index(init)
            .op(opcode::ATHROW);
        Ok(())
    })?;
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, source)?;

    let completion = call(&runtime, "Deep", "get", "()I", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/StackOverflowError");
    assert_eq!(runtime.load_class("Deep")?.init_state(), InitState::Erroneous);
    Ok(())
}

/// `Chain0` to `Chain11`, each initializer reading the next class's `value`, plus `Top` whose
/// `first()I` and `last()I` read the two ends
fn chain() -> Result<MemorySource, Error> {
    const LENGTH: usize = 12;
    let mut source = MemorySource::new();
    for link in 0..LENGTH {
        let name = format!("Chain{}", link);
        let mut class = new_class(&name)?;
        class.add_field(FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC, "value", "I")?;
        let value = class.constants().get_field_ref(&name, "value", "I")?;
        let mut clinit = BytecodeWriter::new();
        if link + 1 < LENGTH {
            let next = class
                .constants()
                .get_field_ref(&format!("Chain{}", link + 1), "value", "I")?;
            clinit.op(opcode::GETSTATIC).index(next);
        } else {
            clinit.op(opcode::ICONST_5);
        }
        clinit.op(opcode::PUTSTATIC).index(value).op(opcode::RETURN);
        class.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V", Some(clinit.into_code(1, 0)))?;
        source.insert(&name, class.into_bytes()?);
    }

    let mut top = new_class("Top")?;
    for (method, link) in [("first", 0), ("last", LENGTH - 1)] {
        let value = top
            .constants()
            .get_field_ref(&format!("Chain{}", link), "value", "I")?;
        let mut code = BytecodeWriter::new();
        code.op(opcode::GETSTATIC).index(value).op(opcode::IRETURN);
        add_static(&mut top, method, "()I", code.into_code(1, 0))?;
    }
    source.insert("Top", top.into_bytes()?);
    Ok(source)
}

#[test]
fn initializers_count_towards_the_call_depth() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let mut runtime = runtime(&arenas, chain()?)?;
    runtime.settings.max_call_depth = 6;

    let completion = call(&runtime, "Top", "first", "()I", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/StackOverflowError");
    assert_eq!(runtime.load_class("Chain0")?.init_state(), InitState::Erroneous);
    assert_eq!(runtime.load_class("Chain11")?.init_state(), InitState::Linked);

    // The end of the chain was never started, so it initializes fine later
    assert_eq!(returned_int(call(&runtime, "Top", "last", "()I", vec![])?), 5);
    assert_eq!(runtime.load_class("Chain11")?.init_state(), InitState::Initialized);
    Ok(())
}

#[test]
fn constant_value_statics() -> Result<(), Error> {
    let mut class = new_class("Consts")?;
    let constant = FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL;
    let answer = class.constants().get_integer(42)?;
    class.add_constant_field(constant, "ANSWER", "I", answer)?;
    let big = class.constants().get_long(1 << 40)?;
    class.add_constant_field(constant, "BIG", "J", big)?;
    let text = class.constants().get_utf8("mocha")?;
    let name = class.constants().get_string(text)?;
    class.add_constant_field(constant, "NAME", "Ljava/lang/String;", name.into())?;

    let answer_ref = class.constants().get_field_ref("Consts", "ANSWER", "I")?;
    let mut get = BytecodeWriter::new();
    get.op(opcode::GETSTATIC).index(answer_ref).op(opcode::IRETURN);
    add_static(&mut class, "answer", "()I", get.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Consts", class.into_bytes()?))?;
    let consts = runtime.load_class("Consts")?;
    let answer_field = consts.find_field("ANSWER", "I").expect("field is declared");
    assert!(matches!(consts.get_static(answer_field)?, Value::Int(0)));

    assert_eq!(returned_int(call(&runtime, "Consts", "answer", "()I", vec![])?), 42);
    let big_field = consts.find_field("BIG", "J").expect("field is declared");
    assert!(matches!(consts.get_static(big_field)?, Value::Long(1099511627776)));
    let name_field = consts
        .find_field("NAME", "Ljava/lang/String;")
        .expect("field is declared");
    match consts.get_static(name_field)? {
        Value::Object(string) => {
            assert_eq!(runtime.string_text(&string).as_deref(), Some("mocha"))
        }
        other => panic!("expected a string, got {:?}", other),
    }
    Ok(())
}

#[test]
fn final_statics_are_set_only_by_their_initializer() -> Result<(), Error> {
    let mut class = new_class("Fixed")?;
    class.add_field(
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        "X",
        "I",
    )?;
    let x = class.constants().get_field_ref("Fixed", "X", "I")?;

    let mut clinit = BytecodeWriter::new();
    clinit
        .op(opcode::BIPUSH)
        .i8(7)
        .op(opcode::PUTSTATIC)
        .index(x)
        .op(opcode::RETURN);
    class.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V", Some(clinit.into_code(1, 0)))?;

    let mut get = BytecodeWriter::new();
    get.op(opcode::GETSTATIC).index(x).op(opcode::IRETURN);
    add_static(&mut class, "get", "()I", get.into_code(1, 0))?;

    let mut set = BytecodeWriter::new();
    set.op(opcode::ICONST_1)
        .op(opcode::PUTSTATIC)
        .index(x)
        .op(opcode::RETURN);
    add_static(&mut class, "set", "()V", set.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Fixed", class.into_bytes()?))?;
    assert_eq!(returned_int(call(&runtime, "Fixed", "get", "()I", vec![])?), 7);

    let completion = call(&runtime, "Fixed", "set", "()V", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/IllegalAccessError");
    assert_eq!(returned_int(call(&runtime, "Fixed", "get", "()I", vec![])?), 7);
    Ok(())
}
