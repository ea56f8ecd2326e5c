use crate::jvm::class_file::{
    Attribute, BootstrapMethod, BootstrapMethods, ClassConstantIndex, ClassFile, Code,
    ConstantIndex, ConstantValue, ConstantsPool, ExceptionHandler, Field, Method, Serialize,
    Version,
};
use crate::jvm::{ClassAccessFlags, Error, FieldAccessFlags, MethodAccessFlags};

/// Assemble a class file from raw pieces
///
/// This does no validation beyond what is needed to encode the class: it is as happy to produce
/// a class with a final superclass as a well-formed one, which is exactly what loader tests want.
pub struct ClassBuilder {
    constants: ConstantsPool,
    version: Version,
    access_flags: ClassAccessFlags,
    this_class: ClassConstantIndex,
    super_class: Option<ClassConstantIndex>,
    interfaces: Vec<ClassConstantIndex>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    attributes: Vec<Attribute>,
    bootstrap_methods: Vec<BootstrapMethod>,
}

impl ClassBuilder {
    pub fn new(
        name: &str,
        super_class: Option<&str>,
        access_flags: ClassAccessFlags,
    ) -> Result<ClassBuilder, Error> {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class(name)?;
        let super_class = match super_class {
            Some(super_class) => Some(constants.get_class(super_class)?),
            None => None,
        };
        Ok(ClassBuilder {
            constants,
            version: Version::JAVA8,
            access_flags,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            bootstrap_methods: vec![],
        })
    }

    /// Constants pool, for building up operands of instructions
    pub fn constants(&mut self) -> &mut ConstantsPool {
        &mut self.constants
    }

    pub fn add_interface(&mut self, name: &str) -> Result<(), Error> {
        let interface = self.constants.get_class(name)?;
        self.interfaces.push(interface);
        Ok(())
    }

    pub fn add_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        self.push_field(access_flags, name, descriptor, vec![])
    }

    /// Add a field with a `ConstantValue` attribute pointing at `value`
    pub fn add_constant_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &str,
        descriptor: &str,
        value: ConstantIndex,
    ) -> Result<(), Error> {
        let attribute = self.constants.get_attribute(ConstantValue(value))?;
        self.push_field(access_flags, name, descriptor, vec![attribute])
    }

    fn push_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), Error> {
        let name_index = self.constants.get_utf8(name)?;
        let descriptor_index = self.constants.get_utf8(descriptor)?;
        self.fields.push(Field {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    /// Add a method (abstract and native methods have no code)
    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<Code>,
    ) -> Result<(), Error> {
        let name_index = self.constants.get_utf8(name)?;
        let descriptor_index = self.constants.get_utf8(descriptor)?;
        let attributes = match code {
            Some(code) => vec![self.constants.get_attribute(code)?],
            None => vec![],
        };
        self.methods.push(Method {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    /// Register a bootstrap method, returning its index in the `BootstrapMethods` attribute
    pub fn add_bootstrap_method(
        &mut self,
        bootstrap_method: ConstantIndex,
        bootstrap_arguments: Vec<ConstantIndex>,
    ) -> u16 {
        self.bootstrap_methods.push(BootstrapMethod {
            bootstrap_method,
            bootstrap_arguments,
        });
        (self.bootstrap_methods.len() - 1) as u16
    }

    pub fn finish(mut self) -> Result<ClassFile, Error> {
        if !self.bootstrap_methods.is_empty() {
            let bootstrap_methods = BootstrapMethods(self.bootstrap_methods);
            let attribute = self.constants.get_attribute(bootstrap_methods)?;
            self.attributes.push(attribute);
        }
        Ok(ClassFile {
            version: self.version,
            constants: self.constants.into_offset_vec(),
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            attributes: self.attributes,
        })
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        let class = self.finish()?;
        let mut bytes = vec![];
        class.serialize(&mut bytes)?;
        Ok(bytes)
    }
}

/// Writer for raw method bodies
///
/// Branch offsets are relative to the address of the branching opcode, so the usual pattern is
/// to remember [`BytecodeWriter::pc`] before emitting the opcode.
#[derive(Default)]
pub struct BytecodeWriter {
    bytes: Vec<u8>,
    exception_table: Vec<ExceptionHandler>,
}

impl BytecodeWriter {
    pub fn new() -> BytecodeWriter {
        BytecodeWriter::default()
    }

    /// Address of the next byte to be written
    pub fn pc(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn op(&mut self, op: u8) -> &mut Self {
        self.bytes.push(op);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn i8(&mut self, value: i8) -> &mut Self {
        self.bytes.push(value as u8);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Two byte constant pool index operand
    pub fn index(&mut self, index: impl Into<ConstantIndex>) -> &mut Self {
        self.u16(index.into().0)
    }

    /// Pad with zeros up to the next multiple of four (for `tableswitch` and `lookupswitch`)
    pub fn align(&mut self) -> &mut Self {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        self
    }

    /// Overwrite the two byte branch offset of the branch instruction at `branch_pc`
    pub fn patch_branch(&mut self, branch_pc: u16, target: u16) -> &mut Self {
        let offset = (target as i32 - branch_pc as i32) as i16;
        let at = branch_pc as usize + 1;
        self.bytes[at..at + 2].copy_from_slice(&offset.to_be_bytes());
        self
    }

    pub fn handler(
        &mut self,
        start_pc: u16,
        end_pc: u16,
        handler_pc: u16,
        catch_type: Option<ClassConstantIndex>,
    ) -> &mut Self {
        self.exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
        self
    }

    pub fn into_code(self, max_stack: u16, max_locals: u16) -> Code {
        Code {
            max_stack,
            max_locals,
            code_array: self.bytes,
            exception_table: self.exception_table,
            attributes: vec![],
        }
    }
}
