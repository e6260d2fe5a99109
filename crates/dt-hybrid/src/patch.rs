//! Spec-patch assembly and application (spec.md §4.4 "Patch application and
//! versioning"). Patch diffing reuses the teacher's tool-call delta shape
//! (`aivcs-core::diff::tool_calls`), generalized from "compare two tool-call
//! sequences" to "extract the state-changing subsequence of an agent
//! transcript".

use dt_agent::AgentTool;

use crate::error::HybridResult;
use crate::parser::{extract_test_body, locate_step_body};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPatch {
    pub step: u32,
    pub new_body: String,
}

/// Renders one state-changing tool call as spec code. Read-only tools have
/// no code form and are filtered out by the caller.
fn render_action(tool: &AgentTool) -> Option<String> {
    match tool {
        AgentTool::Click { element_ref } => Some(format!("await page.click('{element_ref}');")),
        AgentTool::Type { element_ref, text } => {
            Some(format!("await page.type('{element_ref}', '{text}');"))
        }
        AgentTool::PressKey { key } => Some(format!("await page.pressKey('{key}');")),
        AgentTool::Select { element_ref, value } => {
            Some(format!("await page.select('{element_ref}', '{value}');"))
        }
        AgentTool::Approve => Some("await wallet.approve();".to_string()),
        AgentTool::ConfirmTransaction => Some("await wallet.confirmTransaction();".to_string()),
        AgentTool::SwitchNetwork { name } => Some(format!("await wallet.switchNetwork('{name}');")),
        _ => None,
    }
}

/// Filters a transcript down to state-changing actions and renders them as
/// spec code (spec.md §4.4 "State-changing action filter"). An empty
/// filtered list means no patch is emitted.
pub fn state_changing_patch_body(tools: &[AgentTool]) -> Option<String> {
    let lines: Vec<String> = tools
        .iter()
        .filter(|t| t.is_state_changing())
        .filter_map(render_action)
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Prefixes `phase1_actions` onto `original_step_body`, for the phase-2
/// ("retry spec") recovery patch.
pub fn prefix_with_cleared_blockers(phase1_actions: &str, original_step_body: &str) -> String {
    format!("{phase1_actions}\n{original_step_body}")
}

/// Applies patches to the stored spec's code in reverse step order (so
/// earlier, not-yet-patched step ranges keep valid offsets), substituting
/// the region between consecutive step headers. For flow specs run with a
/// prepended connection prelude, step numbers are remapped
/// `flowStep = composite - connectionStepCount`; patches with a non-positive
/// remapped number are discarded with a warning.
pub fn apply_patches(
    code: &str,
    patches: &[StepPatch],
    connection_step_count: u32,
    is_flow: bool,
) -> HybridResult<String> {
    let mut remapped: Vec<StepPatch> = Vec::with_capacity(patches.len());
    for patch in patches {
        let step = if is_flow {
            let flow_step = patch.step as i64 - connection_step_count as i64;
            if flow_step <= 0 {
                tracing::warn!(
                    composite_step = patch.step,
                    "discarding a hybrid patch that touches the connection prelude region"
                );
                continue;
            }
            flow_step as u32
        } else {
            patch.step
        };
        remapped.push(StepPatch {
            step,
            new_body: patch.new_body.clone(),
        });
    }
    remapped.sort_by(|a, b| b.step.cmp(&a.step));

    let original_test_body = extract_test_body(code)?.to_string();
    let body_offset = code
        .find(original_test_body.as_str())
        .ok_or(crate::error::HybridError::UnbalancedTestBody)?;
    let body_len = original_test_body.len();

    let mut patched_body = original_test_body;
    for patch in &remapped {
        let (start, end) = locate_step_body(&patched_body, patch.step)?;
        patched_body.replace_range(start..end, &format!("\n{}\n", patch.new_body));
    }

    let mut patched_code = String::with_capacity(code.len());
    patched_code.push_str(&code[..body_offset]);
    patched_code.push_str(&patched_body);
    patched_code.push_str(&code[body_offset + body_len..]);
    Ok(patched_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_tools_are_excluded_from_patch_rendering() {
        let tools = vec![AgentTool::Snapshot, AgentTool::Evaluate { script: "1".into() }];
        assert!(state_changing_patch_body(&tools).is_none());
    }

    #[test]
    fn state_changing_tools_render_in_order() {
        let tools = vec![
            AgentTool::Click { element_ref: "e1".into() },
            AgentTool::Snapshot,
            AgentTool::Approve,
        ];
        let body = state_changing_patch_body(&tools).unwrap();
        assert_eq!(body, "await page.click('e1');\nawait wallet.approve();");
    }

    fn flow_program() -> String {
        "test('swap flow', async ({ page }) => {\n\
        // =====================\n// STEP 1: connect\n// =====================\nawait page.click('connect');\n\
        // =====================\n// STEP 2: swap\n// =====================\nawait page.click('swap');\n\
        });\n"
            .to_string()
    }

    #[test]
    fn patches_apply_in_reverse_step_order() {
        let code = flow_program();
        let patches = vec![
            StepPatch { step: 1, new_body: "await page.click('accept-cookies');\nawait page.click('connect');".into() },
            StepPatch { step: 2, new_body: "await page.click('confirm');\nawait page.click('swap');".into() },
        ];
        let patched = apply_patches(&code, &patches, 0, false).unwrap();
        assert!(patched.contains("accept-cookies"));
        assert!(patched.contains("confirm"));
    }

    #[test]
    fn prelude_touching_patches_are_discarded() {
        let code = flow_program();
        let patches = vec![StepPatch { step: 1, new_body: "noop".into() }];
        // connection prelude has 1 step; composite step 1 remaps to 0, discarded
        let patched = apply_patches(&code, &patches, 1, true).unwrap();
        assert_eq!(patched, code);
    }

    #[test]
    fn flow_step_remapping_keeps_steps_past_the_prelude() {
        let code = flow_program();
        // composite step 3 with a 1-step prelude remaps to flow step 2
        let patches = vec![StepPatch { step: 3, new_body: "await page.click('retry-swap');".into() }];
        let patched = apply_patches(&code, &patches, 1, true).unwrap();
        assert!(patched.contains("retry-swap"));
    }
}
