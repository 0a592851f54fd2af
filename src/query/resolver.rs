use crate::bitmap::algebra::{self, Set};
use crate::core::error::{Error, Result};
use crate::query::ast::{Operand, Symbol};

/// Evaluate a postfix program. `lookup` maps operands to sets, `*` being the
/// universe of live ids; NOT is the universe minus its operand.
pub fn resolve<'a, F>(postfix: &[Symbol], mut lookup: F) -> Result<Set<'a>>
where
    F: FnMut(&Operand) -> Result<Set<'a>>,
{
    let mut stack: Vec<Set<'a>> = Vec::new();
    let malformed = || Error::query("malformed expression");

    for symbol in postfix {
        match symbol {
            Symbol::Operand(operand) => stack.push(lookup(operand)?),
            Symbol::Not => {
                let operand = stack.pop().ok_or_else(malformed)?;
                let universe = lookup(&Operand::All)?;
                stack.push(algebra::and_not(universe, operand));
            }
            Symbol::And | Symbol::Or => {
                let right = stack.pop().ok_or_else(malformed)?;
                let left = stack.pop().ok_or_else(malformed)?;
                let combined = if *symbol == Symbol::And {
                    algebra::and(left, right)
                } else {
                    algebra::or(left, right)
                };
                stack.push(combined);
            }
            Symbol::Open | Symbol::Close => return Err(malformed()),
        }
    }

    let result = stack.pop().ok_or_else(malformed)?;
    if !stack.is_empty() {
        return Err(malformed());
    }
    Ok(result)
}
