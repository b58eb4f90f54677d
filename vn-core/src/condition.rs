//! # Condition 模块
//!
//! 条件求值器：对照符号表求值分支条件，并选择要执行的分支。
//!
//! ## 求值规则
//!
//! - 标志：布尔比较，只允许 `==` / `!=`
//! - 变量：整数比较，允许全部六种运算符
//! - 引用不存在时返回 `UnresolvedReference`，不会静默当作 false
//! - `if` / `elseif` 按顺序惰性求值，命中后不再求值后续分支

use crate::command::{BranchKind, CheckType, CompareValue, ConditionBranch, Operator};
use crate::error::{ReferenceKind, RuntimeError};

/// 符号表
///
/// 按名称提供标志与变量的当前值。
pub trait SymbolTable {
    /// 获取标志值
    fn flag(&self, name: &str) -> Option<bool>;
    /// 获取变量值
    fn variable(&self, name: &str) -> Option<u8>;
}

/// 求值单个条件
///
/// `else` 分支恒为 true。
pub fn evaluate(
    condition: &ConditionBranch,
    symbols: &impl SymbolTable,
) -> Result<bool, RuntimeError> {
    if condition.kind == BranchKind::Else {
        return Ok(true);
    }

    match condition.check_type {
        CheckType::Flag => {
            let name = &condition.flag_name;
            let expected = match condition.compare_value {
                CompareValue::Bool(b) => b,
                CompareValue::Int(n) => {
                    return Err(RuntimeError::InvalidCondition {
                        message: format!("标志 '{}' 只能与布尔值比较，实际为 {}", name, n),
                    });
                }
            };
            let value = symbols
                .flag(name)
                .ok_or_else(|| RuntimeError::UnresolvedReference {
                    kind: ReferenceKind::Flag,
                    name: name.clone(),
                })?;
            match condition.operator {
                Operator::Eq => Ok(value == expected),
                Operator::NotEq => Ok(value != expected),
                other => Err(RuntimeError::InvalidCondition {
                    message: format!("标志 '{}' 不支持运算符 '{}'", name, other.symbol()),
                }),
            }
        }
        CheckType::Variable => {
            let name = &condition.variable_name;
            let expected = match condition.compare_value {
                CompareValue::Int(n) => n,
                CompareValue::Bool(b) => {
                    return Err(RuntimeError::InvalidCondition {
                        message: format!("变量 '{}' 只能与整数比较，实际为 {}", name, b),
                    });
                }
            };
            let value = symbols
                .variable(name)
                .ok_or_else(|| RuntimeError::UnresolvedReference {
                    kind: ReferenceKind::Variable,
                    name: name.clone(),
                })?;
            Ok(compare(i64::from(value), condition.operator, expected))
        }
    }
}

fn compare(lhs: i64, operator: Operator, rhs: i64) -> bool {
    match operator {
        Operator::Eq => lhs == rhs,
        Operator::NotEq => lhs != rhs,
        Operator::Greater => lhs > rhs,
        Operator::Less => lhs < rhs,
        Operator::GreaterEq => lhs >= rhs,
        Operator::LessEq => lhs <= rhs,
    }
}

/// 校验分支结构：`if` 恰好一个且在首位，`else` 至多一个且在末尾
pub fn validate_branch_structure(conditions: &[ConditionBranch]) -> Result<(), RuntimeError> {
    let Some(first) = conditions.first() else {
        return Err(RuntimeError::MalformedBranch {
            message: "条件列表为空".to_string(),
        });
    };
    if first.kind != BranchKind::If {
        return Err(RuntimeError::MalformedBranch {
            message: "第一个条件必须是 if".to_string(),
        });
    }

    let last = conditions.len() - 1;
    for (i, condition) in conditions.iter().enumerate().skip(1) {
        match condition.kind {
            BranchKind::If => {
                return Err(RuntimeError::MalformedBranch {
                    message: format!("第 {} 个条件重复使用 if", i + 1),
                });
            }
            BranchKind::Else if i != last => {
                return Err(RuntimeError::MalformedBranch {
                    message: format!("else 必须是最后一个条件（位于第 {} 个）", i + 1),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// 选择要执行的分支
///
/// 返回命中分支的索引；`None` 表示没有分支命中且没有 else。
pub fn select_branch(
    conditions: &[ConditionBranch],
    symbols: &impl SymbolTable,
) -> Result<Option<usize>, RuntimeError> {
    validate_branch_structure(conditions)?;
    for (i, condition) in conditions.iter().enumerate() {
        if evaluate(condition, symbols)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}
