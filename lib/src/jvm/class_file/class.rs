use crate::jvm::class_file::{
    Attribute, AttributeLike, ClassConstantIndex, Constant, ConstantIndex, Deserialize, Field,
    Method, Serialize, Utf8ConstantIndex, Version,
};
use crate::jvm::{ClassAccessFlags, Error};
use crate::util::{Offset, OffsetResult, OffsetVec};
use byteorder::WriteBytesExt;

/// Representation of the [`class` file format of the JVM][0]
///
/// This is purely structural: indices are only checked when something dereferences them.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Only `java/lang/Object` has no superclass
    pub super_class: Option<ClassConstantIndex>,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a class file from its bytes
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = bytes;

        if reader.len() < 4 || reader[..4] != ClassFile::MAGIC {
            return Err(Error::Format("Incompatible magic value".to_owned()));
        }
        reader = &reader[4..];

        let version = Version::deserialize(&mut reader)?;
        let constants = OffsetVec::<Constant>::deserialize(&mut reader)?;
        let access_flags = ClassAccessFlags::deserialize(&mut reader)?;
        let this_class = ClassConstantIndex::deserialize(&mut reader)?;
        let super_class = match ClassConstantIndex::deserialize(&mut reader)? {
            ClassConstantIndex(ConstantIndex(0)) => None,
            idx => Some(idx),
        };
        let interfaces = Vec::<ClassConstantIndex>::deserialize(&mut reader)?;
        let fields = Vec::<Field>::deserialize(&mut reader)?;
        let methods = Vec::<Method>::deserialize(&mut reader)?;
        let attributes = Vec::<Attribute>::deserialize(&mut reader)?;

        if !reader.is_empty() {
            return Err(Error::Format(format!(
                "Extra {} bytes at the end of the class file",
                reader.len()
            )));
        }

        log::trace!(
            "Parsed class file version {}.{} with {} constants",
            version.major_version,
            version.minor_version,
            constants.len()
        );

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Look up a constant, validating the index
    pub fn constant(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        match self.constants.get_offset(Offset(index.0 as usize)) {
            OffsetResult::Ok(_, constant) => Ok(constant),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => Err(Error::Format(
                format!("Invalid constant pool index #{}", index.0),
            )),
        }
    }

    /// Look up a `CONSTANT_Utf8_info`
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.constant(index.0)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(Error::Format(format!(
                "Expected Utf8 at #{}, found {:?}",
                (index.0).0,
                other
            ))),
        }
    }

    /// Look up the name inside a `CONSTANT_Class_info`
    pub fn class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.constant(index.0)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(Error::Format(format!(
                "Expected Class at #{}, found {:?}",
                (index.0).0,
                other
            ))),
        }
    }

    /// Find the attribute with the given name
    pub fn find_attribute<'a>(
        &self,
        attributes: &'a [Attribute],
        name: &str,
    ) -> Result<Option<&'a Attribute>, Error> {
        for attribute in attributes {
            if self.utf8(attribute.name_index)? == name {
                return Ok(Some(attribute));
            }
        }
        Ok(None)
    }

    /// Find and decode a known attribute
    pub fn decode_attribute<A: AttributeLike>(
        &self,
        attributes: &[Attribute],
    ) -> Result<Option<A>, Error> {
        match self.find_attribute(attributes, A::NAME)? {
            Some(attribute) => A::decode(&attribute.info).map(Some),
            None => Ok(None),
        }
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        match self.super_class {
            Some(super_class) => super_class.serialize(writer)?,
            None => 0u16.serialize(writer)?,
        }
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}
