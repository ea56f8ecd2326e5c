mod common;

use common::*;
use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder, Constant, Utf8ConstantIndex};
use mocha::jvm::*;
use mocha::runtime::*;
use std::fs;

fn hierarchy() -> Result<MemorySource, Error> {
    let mut source = MemorySource::new();

    let mut super_class = new_class("Super")?;
    add_default_constructor(&mut super_class, OBJECT)?;
    source.insert("Super", super_class.into_bytes()?);

    for name in ["Interface1", "Interface2"] {
        let interface = ClassBuilder::new(
            name,
            Some(OBJECT),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        )?;
        source.insert(name, interface.into_bytes()?);
    }

    let mut test = ClassBuilder::new("Test", Some("Super"), ClassAccessFlags::all())?;
    test.add_interface("Interface1")?;
    test.add_interface("Interface2")?;
    source.insert("Test", test.into_bytes()?);

    Ok(source)
}

#[test]
fn class_with_every_flag() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, hierarchy()?)?;
    let test = runtime.load_class("Test")?;

    assert_eq!(test.name.as_str(), "Test");
    assert_eq!(test.superclass.map(|class| class.name.as_str()), Some("Super"));
    let interfaces: Vec<&str> = test.interfaces.iter().map(|class| class.name.as_str()).collect();
    assert_eq!(interfaces, vec!["Interface1", "Interface2"]);

    assert!(test.is_public());
    assert!(test.is_final());
    assert!(test.is_super());
    assert!(test.is_interface());
    assert!(test.is_abstract());
    assert!(test.is_synthetic());
    assert!(test.is_annotation());
    assert!(test.is_enum());
    assert!(test.is_module());
    assert_eq!(test.access_flags(), ClassAccessFlags::all());
    assert_eq!(test.init_state(), InitState::Linked);

    // Supertypes were loaded along the way, by the application loader
    let loader = runtime.application_loader();
    assert!(loader.find_loaded("Super").is_some());
    assert!(loader.find_loaded("Interface2").is_some());
    Ok(())
}

#[test]
fn parent_loader_goes_first() -> Result<(), Error> {
    // An application class named like a bootstrap class is never read
    let impostor = new_class(STRING)?.into_bytes()?;
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with(STRING, impostor))?;

    let string = runtime.load_class(STRING)?;
    assert_eq!(string.loader.name(), "bootstrap");
    assert!(string.is_final());
    assert!(std::ptr::eq(string, runtime.bootstrap_loader().load_class(STRING)?));
    assert!(runtime.application_loader().find_loaded(STRING).is_none());
    Ok(())
}

#[test]
fn missing_class() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new())?;
    match runtime.load_class("does/not/Exist") {
        Err(Error::ClassNotFound(name)) => assert_eq!(name, "does/not/Exist"),
        other => panic!("expected ClassNotFound, got {:?}", other.map(|class| class.name.to_string())),
    }
    Ok(())
}

#[test]
fn duplicate_definition() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, hierarchy()?)?;
    runtime.load_class("Super")?;

    let mut again = new_class("Super")?;
    add_default_constructor(&mut again, OBJECT)?;
    let bytes = again.into_bytes()?;
    match runtime.application_loader().define_class_bytes(&bytes) {
        Err(Error::Linkage(_)) => Ok(()),
        other => panic!("expected a linkage error, got {:?}", other.map(|class| class.name.to_string())),
    }
}

#[test]
fn final_superclass() -> Result<(), Error> {
    let sub = ClassBuilder::new("Sub", Some(STRING), public_class())?;
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Sub", sub.into_bytes()?))?;
    assert!(matches!(runtime.load_class("Sub"), Err(Error::Linkage(_))));
    Ok(())
}

#[test]
fn circular_superclass() -> Result<(), Error> {
    let a = ClassBuilder::new("A", Some("B"), public_class())?;
    let b = ClassBuilder::new("B", Some("A"), public_class())?;
    let source = MemorySource::new()
        .with("A", a.into_bytes()?)
        .with("B", b.into_bytes()?);
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, source)?;
    assert!(matches!(runtime.load_class("A"), Err(Error::ClassCircularity(_))));
    Ok(())
}

#[test]
fn package_private_classes() -> Result<(), Error> {
    let mut source = MemorySource::new();
    let hidden = ClassBuilder::new(
        "Package/Interface1",
        Some(OBJECT),
        ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
    )?;
    source.insert("Package/Interface1", hidden.into_bytes()?);
    let neighbour = ClassBuilder::new("Package/Neighbour", Some(OBJECT), ClassAccessFlags::SUPER)?;
    source.insert("Package/Neighbour", neighbour.into_bytes()?);
    let mut super_class = new_class("Super")?;
    add_default_constructor(&mut super_class, OBJECT)?;
    source.insert("Super", super_class.into_bytes()?);
    source.insert("Outsider", new_class("Outsider")?.into_bytes()?);

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, source)?;
    let outsider = runtime.load_class("Outsider")?;
    assert!(matches!(
        outsider.resolve_class("Package/Interface1"),
        Err(Error::IllegalAccess(_))
    ));
    assert_eq!(outsider.resolve_class("Super")?.name.as_str(), "Super");

    let neighbour = runtime.load_class("Package/Neighbour")?;
    assert!(neighbour.resolve_class("Package/Interface1")?.is_interface());
    Ok(())
}

#[test]
fn array_classes() -> Result<(), Error> {
    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new())?;
    let matrix = runtime.load_class("[[Ljava/lang/String;")?;
    assert!(matrix.is_array());
    assert_eq!(matrix.loader.name(), "bootstrap");
    assert_eq!(
        matrix.component().map(|class| class.name.as_str()),
        Some("[Ljava/lang/String;")
    );
    assert!(matrix.is_assignable_to(runtime.load_class("[[Ljava/lang/Object;")?));
    assert!(matrix.is_assignable_to(runtime.load_class("[Ljava/lang/Object;")?));
    assert!(matrix.is_assignable_to(runtime.load_class("java/lang/Cloneable")?));
    assert!(!matrix.is_assignable_to(runtime.load_class("[Ljava/lang/String;")?));

    let ints = runtime.load_class("[I")?;
    assert!(ints.component().map_or(false, |class| class.is_primitive()));
    assert!(!ints.is_assignable_to(runtime.load_class("[Ljava/lang/Object;")?));
    Ok(())
}

#[test]
fn self_referencing_constant() -> Result<(), Error> {
    let mut broken = new_class("Broken")?;
    let index = broken.constants().next_index();
    broken
        .constants()
        .push_constant(Constant::Class(Utf8ConstantIndex(index)))?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::LDC_W).index(index).op(opcode::ARETURN);
    add_static(&mut broken, "load", "()Ljava/lang/Object;", code.into_code(1, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Broken", broken.into_bytes()?))?;
    let completion = call(&runtime, "Broken", "load", "()Ljava/lang/Object;", vec![])?;
    assert_eq!(thrown_class(&completion), "java/lang/ClassFormatError");
    Ok(())
}

#[test]
fn constants_loaded_by_the_wrong_instruction() -> Result<(), Error> {
    let mut class = new_class("Mixed")?;
    let long = class.constants().get_long(7)?;
    let int = class.constants().get_integer(7)?;

    let mut narrow = BytecodeWriter::new();
    narrow.op(opcode::LDC_W).index(long).op(opcode::IRETURN);
    add_static(&mut class, "narrow", "()I", narrow.into_code(2, 0))?;

    let mut wide = BytecodeWriter::new();
    wide.op(opcode::LDC2_W).index(int).op(opcode::LRETURN);
    add_static(&mut class, "wide", "()J", wide.into_code(2, 0))?;

    let arenas = ClassArenas::new();
    let runtime = runtime(&arenas, MemorySource::new().with("Mixed", class.into_bytes()?))?;
    for (name, descriptor) in [("narrow", "()I"), ("wide", "()J")] {
        let completion = call(&runtime, "Mixed", name, descriptor, vec![])?;
        assert_eq!(thrown_class(&completion), "java/lang/ClassFormatError");
    }
    Ok(())
}

#[test]
fn classes_from_directories() -> Result<(), Error> {
    let root = std::env::temp_dir().join(format!("mocha-classes-{}", std::process::id()));
    fs::create_dir_all(root.join("me/example")).map_err(Error::IoError)?;

    let mut answer = new_class("me/example/Answer")?;
    let mut code = BytecodeWriter::new();
    code.op(opcode::BIPUSH).i8(42).op(opcode::IRETURN);
    add_static(&mut answer, "get", "()I", code.into_code(1, 0))?;
    fs::write(root.join("me/example/Answer.class"), answer.into_bytes()?).map_err(Error::IoError)?;

    let arenas = ClassArenas::new();
    let runtime = Runtime::new(
        &arenas,
        Settings::default(),
        Box::new(boot_classes()?),
        Box::new(DirectorySource::new([root.join("missing"), root.clone()])),
    );
    let completion = call(&runtime, "me/example/Answer", "get", "()I", vec![]);
    let _ = fs::remove_dir_all(&root);

    assert_eq!(returned_int(completion?), 42);
    assert!(matches!(
        runtime.load_class("me/example/Question"),
        Err(Error::ClassNotFound(_))
    ));
    Ok(())
}
