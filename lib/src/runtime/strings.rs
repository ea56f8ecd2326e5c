use super::{ArrayData, NativeValue, Object, ObjectRef, Runtime, Value};
use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};
use std::rc::Rc;

impl<'g> Runtime<'g> {
    /// Canonical string instance for some text
    pub fn intern(&self, text: &str) -> Result<ObjectRef<'g>, Error> {
        if let Some(string) = self.strings.borrow().get(text) {
            return Ok(string.clone());
        }
        let string = self.new_string(text)?;
        self.strings
            .borrow_mut()
            .insert(Rc::from(text), string.clone());
        Ok(string)
    }

    /// Fresh (not interned) `java/lang/String`
    ///
    /// The text is kept in a native slot, and also in the `value` field if the loaded `String`
    /// class has a `char[] value`.
    pub fn new_string(&self, text: &str) -> Result<ObjectRef<'g>, Error> {
        let class = self.bootstrap.load_class(BinaryName::STRING.as_str())?;
        let string = Object::new_instance(class);
        string.set_native("text", NativeValue::Text(Rc::from(text)));
        if let Some(field) = class.find_field(UnqualifiedName::VALUE.as_str(), "[C") {
            if !field.is_static() {
                let char_array = self.bootstrap.load_class("[C")?;
                let chars = ArrayData::Char(text.encode_utf16().collect());
                string.set_field(field.slot, Value::Object(Object::new_array(char_array, chars)))?;
            }
        }
        Ok(string)
    }

    /// Text of a string instance
    pub fn string_text(&self, string: &Object<'g>) -> Option<String> {
        if let Some(text) = string.native_text("text") {
            return Some(text.to_string());
        }
        let field = string.class.find_field(UnqualifiedName::VALUE.as_str(), "[C")?;
        let chars = match string.get_field(field.slot).ok()? {
            Value::Object(chars) => chars,
            _ => return None,
        };
        let data = chars.array().ok()?;
        let text = match &*data {
            ArrayData::Char(units) => Some(String::from_utf16_lossy(units)),
            _ => None,
        };
        text
    }
}
