use super::Next;
use crate::jvm::{opcode, Error};
use crate::runtime::{Thread, Value};

/// Primitive widening and narrowing conversions
///
/// Float to integer casts in Rust already saturate and map NaN to zero, which is exactly what
/// `f2i`, `f2l`, `d2i`, and `d2l` require.
pub fn convert<'g>(thread: &mut Thread<'g>, op: u8) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let converted = match op {
        I2L => Value::Long(frame.pop_int()? as i64),
        I2F => Value::Float(frame.pop_int()? as f32),
        I2D => Value::Double(frame.pop_int()? as f64),
        L2I => Value::Int(frame.pop_long()? as i32),
        L2F => Value::Float(frame.pop_long()? as f32),
        L2D => Value::Double(frame.pop_long()? as f64),
        F2I => Value::Int(frame.pop_float()? as i32),
        F2L => Value::Long(frame.pop_float()? as i64),
        F2D => Value::Double(frame.pop_float()? as f64),
        D2I => Value::Int(frame.pop_double()? as i32),
        D2L => Value::Long(frame.pop_double()? as i64),
        D2F => Value::Float(frame.pop_double()? as f32),
        I2B => Value::Int(frame.pop_int()? as i8 as i32),
        I2C => Value::Int(frame.pop_int()? as u16 as i32),
        I2S => Value::Int(frame.pop_int()? as i16 as i32),
        _ => {
            return Err(Error::Internal(format!(
                "Not a conversion: {}",
                name(op)
            )))
        }
    };
    frame.push(converted)?;
    Ok(Next::Advance(1))
}
