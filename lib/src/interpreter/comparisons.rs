use super::Next;
use crate::jvm::{opcode, Error};
use crate::runtime::{Thread, Value};
use std::cmp::Ordering;

/// `lcmp`, `fcmpl`, `fcmpg`, `dcmpl`, and `dcmpg`
///
/// The `l` and `g` variants differ only in what they push when an operand is NaN: -1 and 1
/// respectively.
pub fn compare<'g>(thread: &mut Thread<'g>, op: u8) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let ordering = match op {
        LCMP => {
            let rhs = frame.pop_long()?;
            let lhs = frame.pop_long()?;
            Some(lhs.cmp(&rhs))
        }
        FCMPL | FCMPG => {
            let rhs = frame.pop_float()?;
            let lhs = frame.pop_float()?;
            lhs.partial_cmp(&rhs)
        }
        DCMPL | DCMPG => {
            let rhs = frame.pop_double()?;
            let lhs = frame.pop_double()?;
            lhs.partial_cmp(&rhs)
        }
        _ => {
            return Err(Error::Internal(format!(
                "Not a comparison: {}",
                name(op)
            )))
        }
    };
    let result = match ordering {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None if op == FCMPL || op == DCMPL => -1,
        None => 1,
    };
    frame.push(Value::Int(result))?;
    Ok(Next::Advance(1))
}
