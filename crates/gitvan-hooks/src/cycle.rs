//! Three-color DFS cycle detection over a workflow's step dependency
//! graph (edges point from a step to the steps it `depends_on`).

use crate::error::{HookError, HookResult};
use crate::types::Step;
use std::collections::BTreeMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

pub fn check_acyclic(hook_id: &str, steps: &[Step]) -> HookResult<()> {
    let by_id: BTreeMap<&str, &Step> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut color: BTreeMap<&str, Color> = steps.iter().map(|s| (s.id.as_str(), Color::White)).collect();

    for step in steps {
        if color[step.id.as_str()] == Color::White {
            let mut path = Vec::new();
            visit(step.id.as_str(), &by_id, &mut color, &mut path, hook_id)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    by_id: &BTreeMap<&'a str, &'a Step>,
    color: &mut BTreeMap<&'a str, Color>,
    path: &mut Vec<String>,
    hook_id: &str,
) -> HookResult<()> {
    color.insert(id, Color::Gray);
    path.push(id.to_string());

    if let Some(step) = by_id.get(id) {
        for dep in &step.depends_on {
            match color.get(dep.as_str()).copied() {
                Some(Color::Gray) => {
                    let start = path.iter().position(|p| p == dep).unwrap_or(0);
                    let mut participants = path[start..].to_vec();
                    participants.push(dep.clone());
                    return Err(HookError::Cycle {
                        hook: hook_id.to_string(),
                        participants,
                    });
                }
                Some(Color::Black) => continue,
                Some(Color::White) | None => {
                    visit(dep.as_str(), by_id, color, path, hook_id)?;
                }
            }
        }
    }

    path.pop();
    color.insert(id, Color::Black);
    Ok(())
}
