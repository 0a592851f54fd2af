use crate::core::error::{Error, Result};
use crate::query::ast::Symbol;

/// Shunting-yard conversion. NOT is a prefix operator binding tighter than
/// AND, which binds tighter than OR; binary operators are left associative.
pub fn to_postfix(infix: &[Symbol]) -> Result<Vec<Symbol>> {
    let mut output = Vec::with_capacity(infix.len());
    let mut operators: Vec<Symbol> = Vec::new();

    for &symbol in infix {
        match symbol {
            Symbol::Operand(_) => output.push(symbol),
            Symbol::Open | Symbol::Not => operators.push(symbol),
            Symbol::Close => loop {
                match operators.pop() {
                    Some(Symbol::Open) => break,
                    Some(op) => output.push(op),
                    None => return Err(Error::query("unbalanced ')'")),
                }
            },
            Symbol::And | Symbol::Or => {
                let precedence = symbol.precedence().unwrap_or(0);
                while let Some(top) = operators.last().copied() {
                    match top.precedence() {
                        Some(p) if p >= precedence => {
                            output.push(top);
                            operators.pop();
                        }
                        _ => break,
                    }
                }
                operators.push(symbol);
            }
        }
    }

    while let Some(op) = operators.pop() {
        if op == Symbol::Open {
            return Err(Error::query("unbalanced '('"));
        }
        output.push(op);
    }
    Ok(output)
}
