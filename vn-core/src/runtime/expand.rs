//! # Expand 模块
//!
//! 共享命令组的内联展开检查。
//!
//! 共享命令没有调用栈语义：调用处直接把组内命令拼接进当前执行路径。
//! 因此组的静态调用图（包括分支体内嵌套的调用）必须无环。

use crate::command::{Command, CommandKind};
use crate::error::RuntimeError;
use crate::project::Project;

/// 收集命令列表中（递归进入分支体）的所有共享命令调用
pub fn shared_calls(commands: &[Command]) -> Vec<&str> {
    let mut calls = Vec::new();
    collect_calls(commands, &mut calls);
    calls
}

fn collect_calls<'a>(commands: &'a [Command], out: &mut Vec<&'a str>) {
    for command in commands {
        match &command.kind {
            CommandKind::CallSharedCommand { shared_command_id } => {
                out.push(shared_command_id.as_str());
            }
            CommandKind::Branching { conditions, .. } => {
                for condition in conditions {
                    collect_calls(&condition.commands, out);
                }
            }
            _ => {}
        }
    }
}

/// 检查从 `root` 出发的静态调用图
///
/// - 引用不存在的组返回 `DanglingSharedCommandId`
/// - 回到调用链上已有的组返回 `CyclicSharedCommand`，`chain` 从环的起点到重复点
pub fn check_shared_group(project: &Project, root: &str) -> Result<(), RuntimeError> {
    let mut chain = Vec::new();
    let mut done = Vec::new();
    visit(project, root, &mut chain, &mut done)
}

fn visit<'a>(
    project: &'a Project,
    id: &'a str,
    chain: &mut Vec<&'a str>,
    done: &mut Vec<&'a str>,
) -> Result<(), RuntimeError> {
    if let Some(start) = chain.iter().position(|c| *c == id) {
        let mut cycle: Vec<String> = chain[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(id.to_string());
        return Err(RuntimeError::CyclicSharedCommand {
            id: id.to_string(),
            chain: cycle,
        });
    }
    if done.contains(&id) {
        return Ok(());
    }

    let group = project.shared_group(id)?;
    chain.push(id);
    for callee in shared_calls(&group.commands) {
        visit(project, callee, chain, done)?;
    }
    chain.pop();
    done.push(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BranchKind, ConditionBranch, Operator};
    use crate::project::SharedCommandGroup;

    fn call(id: &str) -> Command {
        Command::new(
            format!("call-{id}"),
            CommandKind::CallSharedCommand {
                shared_command_id: id.to_string(),
            },
        )
    }

    fn group(id: &str, commands: Vec<Command>) -> SharedCommandGroup {
        SharedCommandGroup {
            id: id.to_string(),
            name: id.to_string(),
            commands,
        }
    }

    fn project_with(groups: Vec<SharedCommandGroup>) -> Project {
        Project {
            shared_commands: groups,
            ..Project::default()
        }
    }

    #[test]
    fn test_self_call_is_cyclic() {
        let project = project_with(vec![group("a", vec![call("a")])]);
        assert_eq!(
            check_shared_group(&project, "a"),
            Err(RuntimeError::CyclicSharedCommand {
                id: "a".to_string(),
                chain: vec!["a".to_string(), "a".to_string()],
            })
        );
    }

    #[test]
    fn test_indirect_cycle_through_branch_body() {
        let branch = Command::new(
            "br",
            CommandKind::Branching {
                label: String::new(),
                conditions: vec![ConditionBranch::flag(
                    BranchKind::If,
                    "f",
                    Operator::Eq,
                    true,
                    vec![call("a")],
                )],
            },
        );
        let project = project_with(vec![group("a", vec![call("b")]), group("b", vec![branch])]);

        let err = check_shared_group(&project, "a").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::CyclicSharedCommand {
                id: "a".to_string(),
                chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            }
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let project = project_with(vec![
            group("top", vec![call("left"), call("right")]),
            group("left", vec![call("leaf")]),
            group("right", vec![call("leaf")]),
            group("leaf", vec![]),
        ]);
        assert!(check_shared_group(&project, "top").is_ok());
    }

    #[test]
    fn test_dangling_callee() {
        let project = project_with(vec![group("a", vec![call("nope")])]);
        assert_eq!(
            check_shared_group(&project, "a"),
            Err(RuntimeError::DanglingSharedCommandId {
                id: "nope".to_string()
            })
        );
    }
}
