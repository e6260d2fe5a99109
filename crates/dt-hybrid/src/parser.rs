//! Textual step parser (spec.md §4.4). Purely syntactic: no TS type-checker,
//! just brace-balance counting and a header-comment regex.

use regex::Regex;

use dt_agent::AgentTool;

use crate::error::{HybridError, HybridResult};

/// Tolerates `=` and the Unicode "BOX DRAWINGS HORIZONTAL" (`═`, U+2550)
/// fence character, each fence line needing at least 3 repetitions.
const STEP_HEADER_PATTERN: &str = r"(?m)^[ \t]*//[ \t]*[=\u{2550}]{3,}[ \t]*\r?\n[ \t]*//[ \t]*STEP[ \t]+(\d+)[ \t]*:[ \t]*(.*?)[ \t]*\r?\n[ \t]*//[ \t]*[=\u{2550}]{3,}[ \t]*\r?\n?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub number: u32,
    pub description: String,
    pub body: String,
}

/// Locates the main test declaration's body: from the first `{` after a
/// `test(`/`test.only(`/`test.describe(` call to its balance-matched `}`.
/// Imports and wrapper functions preceding it are ignored.
pub fn extract_test_body(program: &str) -> HybridResult<&str> {
    if program.trim().is_empty() {
        return Err(HybridError::EmptyProgram);
    }
    let decl_re = Regex::new(r"\btest(?:\.only|\.describe)?\s*\(").expect("valid regex");
    let decl_match = decl_re.find(program).ok_or(HybridError::UnbalancedTestBody)?;
    let after_decl = &program[decl_match.end()..];
    let brace_offset = after_decl.find('{').ok_or(HybridError::UnbalancedTestBody)?;
    let start = decl_match.end() + brace_offset;
    let end = matching_brace(program, start)?;
    Ok(&program[start + 1..end])
}

/// Balance-counts from an opening `{` at `open_index` to its match, skipping
/// over string/template literals and comments so braces inside them don't
/// throw off the count.
fn matching_brace(source: &str, open_index: usize) -> HybridResult<usize> {
    let bytes = source.as_bytes();
    debug_assert_eq!(bytes[open_index], b'{');

    let mut depth = 0i32;
    let mut in_string: Option<u8> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut i = open_index;

    while i < bytes.len() {
        let c = bytes[i];
        if in_line_comment {
            if c == b'\n' {
                in_line_comment = false;
            }
        } else if in_block_comment {
            if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                in_block_comment = false;
                i += 1;
            }
        } else if let Some(quote) = in_string {
            if c == b'\\' {
                i += 1;
            } else if c == quote {
                in_string = None;
            }
        } else {
            match c {
                b'"' | b'\'' | b'`' => in_string = Some(c),
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    in_line_comment = true;
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    in_block_comment = true;
                    i += 1;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    Err(HybridError::UnbalancedTestBody)
}

/// Splits a test body into step blocks. If no header markers exist, the
/// whole body is one step.
pub fn parse_steps(test_body: &str) -> HybridResult<Vec<Step>> {
    let header_re = Regex::new(STEP_HEADER_PATTERN).expect("valid regex");
    let headers: Vec<_> = header_re.captures_iter(test_body).collect();

    if headers.is_empty() {
        return Ok(vec![Step {
            number: 1,
            description: String::new(),
            body: test_body.trim().to_string(),
        }]);
    }

    let mut steps = Vec::with_capacity(headers.len());
    for (idx, cap) in headers.iter().enumerate() {
        let whole = cap.get(0).expect("group 0 always matches");
        let number: u32 = cap[1].parse().expect("\\d+ always parses");
        let description = cap[2].trim().to_string();
        let body_start = whole.end();
        let body_end = headers
            .get(idx + 1)
            .map(|next| next.get(0).expect("group 0 always matches").start())
            .unwrap_or(test_body.len());
        steps.push(Step {
            number,
            description,
            body: test_body[body_start..body_end].trim().to_string(),
        });
    }
    Ok(steps)
}

/// Byte range of one step's body within `test_body`, used by patch
/// application to splice in place.
pub(crate) fn locate_step_body(test_body: &str, step_number: u32) -> HybridResult<(usize, usize)> {
    let header_re = Regex::new(STEP_HEADER_PATTERN).expect("valid regex");
    let headers: Vec<_> = header_re.captures_iter(test_body).collect();

    if headers.is_empty() {
        return if step_number == 1 {
            Ok((0, test_body.len()))
        } else {
            Err(HybridError::UnbalancedBraces { step: step_number })
        };
    }

    for (idx, cap) in headers.iter().enumerate() {
        let number: u32 = cap[1].parse().expect("\\d+ always parses");
        if number == step_number {
            let whole = cap.get(0).expect("group 0 always matches");
            let start = whole.end();
            let end = headers
                .get(idx + 1)
                .map(|next| next.get(0).expect("group 0 always matches").start())
                .unwrap_or(test_body.len());
            return Ok((start, end));
        }
    }
    Err(HybridError::UnbalancedBraces { step: step_number })
}

/// Strips TypeScript-only syntax prior to evaluation: variable type
/// annotations, `as T` assertions, and generic parameters on call sites.
/// Heuristic, not a parser — tuned to the subset emitted by the Generator.
pub fn strip_ts_annotations(code: &str) -> String {
    let as_assertion = Regex::new(r"\s+as\s+[A-Za-z_][\w.]*(?:<[^>]*>)?(?:\[\])?").expect("valid regex");
    let generic_call = Regex::new(r"(\w)<[A-Za-z_][\w\s,<>\[\].]*>(\s*\()").expect("valid regex");
    let var_annotation =
        Regex::new(r"(\b(?:const|let|var)\s+\w+)\s*:\s*[A-Za-z_][\w.]*(?:<[^<>]*>)?(?:\[\])?(\s*=)")
            .expect("valid regex");
    let param_annotation =
        Regex::new(r"([(,])\s*(\w+)\s*:\s*[A-Za-z_][\w.]*(?:<[^<>]*>)?(?:\[\])?\s*(?=[,)])")
            .expect("valid regex");

    let code = as_assertion.replace_all(code, "");
    let code = generic_call.replace_all(&code, "$1$2");
    let code = var_annotation.replace_all(&code, "$1$2");
    let code = param_annotation.replace_all(&code, "$1 $2");
    code.into_owned()
}

/// Locator methods a chained call can start from, e.g.
/// `page.getByRole('button', { name: 'Swap' }).click()` (spec.md §4.4
/// scenario 2). The whole locator expression becomes the action's
/// `element_ref` since there is no live accessibility tree to resolve it
/// against at parse time.
const LOCATOR_METHODS: &str = "getByRole|getByText|getByTestId|getByLabel|getByPlaceholder|getByAltText|getByTitle|locator";

/// Precompiles a step body into a sequence of verb+target tuples rather
/// than evaluating it as live TypeScript (spec.md §10 REDESIGN FLAGS: "...
/// precompile step bodies at spec-patch time ... to an AST of verb+target
/// tuples ... the state-changing action filter defines a small closed verb
/// set sufficient for the patched subset"). Recognizes both the closed
/// tool vocabulary's flat form (`page.click('e1')`) and chained Playwright
/// locator syntax (`page.getByRole('button', { name: 'Swap' }).click()`);
/// assertions (`expect(...)`) and anything else are ignored.
pub fn parse_step_calls(body: &str) -> Vec<AgentTool> {
    let chained_re = Regex::new(&format!(
        r"\bpage\.((?:{LOCATOR_METHODS})\([^)]*\))\.(click|fill|selectOption|press)\(([^)]*)\)"
    ))
    .expect("valid regex");
    let flat_re = Regex::new(r"\b(page|wallet)\.(\w+)\(([^)]*)\)").expect("valid regex");

    let mut matches: Vec<(usize, usize, AgentTool)> = Vec::new();

    for cap in chained_re.captures_iter(body) {
        let whole = cap.get(0).expect("group 0 always matches");
        let element_ref = cap[1].trim().to_string();
        let args = split_args(&cap[3]);
        if let Some(tool) = tool_from_chained_call(&cap[2], &element_ref, &args) {
            matches.push((whole.start(), whole.end(), tool));
        }
    }

    for cap in flat_re.captures_iter(body) {
        let whole = cap.get(0).expect("group 0 always matches");
        if matches.iter().any(|(start, end, _)| whole.start() >= *start && whole.start() < *end) {
            continue;
        }
        if let Some(tool) = tool_from_call(&cap[1], &cap[2], &split_args(&cap[3])) {
            matches.push((whole.start(), whole.end(), tool));
        }
    }

    matches.sort_by_key(|(start, _, _)| *start);
    matches.into_iter().map(|(_, _, tool)| tool).collect()
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tool_from_call(receiver: &str, method: &str, args: &[String]) -> Option<AgentTool> {
    match (receiver, method) {
        ("page", "click") => Some(AgentTool::Click { element_ref: args.first()?.clone() }),
        ("page", "type") => Some(AgentTool::Type {
            element_ref: args.first()?.clone(),
            text: args.get(1)?.clone(),
        }),
        ("page", "select") => Some(AgentTool::Select {
            element_ref: args.first()?.clone(),
            value: args.get(1)?.clone(),
        }),
        ("page", "navigate") | ("page", "goto") => Some(AgentTool::Navigate { url: args.first()?.clone() }),
        ("page", "pressKey") => Some(AgentTool::PressKey { key: args.first()?.clone() }),
        ("wallet", "approve") => Some(AgentTool::Approve),
        ("wallet", "confirmTransaction") => Some(AgentTool::ConfirmTransaction),
        ("wallet", "switchNetwork") => Some(AgentTool::SwitchNetwork { name: args.first()?.clone() }),
        _ => None,
    }
}

/// Maps the trailing action of a chained locator call onto the closed tool
/// vocabulary, keeping the whole locator expression as the element ref.
fn tool_from_chained_call(action: &str, element_ref: &str, args: &[String]) -> Option<AgentTool> {
    match action {
        "click" => Some(AgentTool::Click { element_ref: element_ref.to_string() }),
        "fill" => Some(AgentTool::Type { element_ref: element_ref.to_string(), text: args.first()?.clone() }),
        "selectOption" => {
            Some(AgentTool::Select { element_ref: element_ref.to_string(), value: args.first()?.clone() })
        }
        "press" => Some(AgentTool::PressKey { key: args.first()?.clone() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW_FENCE: &str = "// =====================\n// STEP 1: open the swap page\n// =====================\nawait page.navigate('https://dapp.test');\n// =====================\n// STEP 2: click swap\n// =====================\nawait page.click('e5');\n";

    #[test]
    fn extracts_test_body_between_balanced_braces() {
        let program = format!(
            "import {{ test }} from '@playwright/test';\n\ntest('swap flow', async ({{ page }}) => {{\n{FLOW_FENCE}\n}});\n"
        );
        let body = extract_test_body(&program).unwrap();
        assert!(body.contains("STEP 1"));
        assert!(body.contains("STEP 2"));
    }

    #[test]
    fn nested_braces_inside_step_bodies_do_not_break_balance() {
        let program = "test('x', async ({ page }) => {\nif (true) { await page.click('e1'); }\n});\n";
        let body = extract_test_body(program).unwrap();
        assert!(body.contains("if (true)"));
    }

    #[test]
    fn box_drawing_fence_is_tolerated() {
        let body = "// ═══════\n// STEP 1: a\n// ═══════\nawait page.click('e1');\n";
        let steps = parse_steps(body).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "a");
    }

    #[test]
    fn no_markers_yields_a_single_step() {
        let steps = parse_steps("await page.click('e1');").unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].number, 1);
        assert_eq!(steps[0].description, "");
    }

    #[test]
    fn parses_multiple_numbered_steps() {
        let steps = parse_steps(FLOW_FENCE).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].number, 1);
        assert_eq!(steps[0].description, "open the swap page");
        assert!(steps[0].body.contains("navigate"));
        assert_eq!(steps[1].number, 2);
        assert!(steps[1].body.contains("click"));
    }

    #[test]
    fn empty_program_is_rejected() {
        assert!(matches!(extract_test_body("   "), Err(HybridError::EmptyProgram)));
    }

    #[test]
    fn strips_as_assertions_and_generics() {
        let code = "const x = document.querySelector('a') as HTMLElement;\nfoo<Bar>(1);";
        let stripped = strip_ts_annotations(code);
        assert!(!stripped.contains(" as "));
        assert!(!stripped.contains("<Bar>"));
    }

    #[test]
    fn strips_variable_and_param_annotations() {
        let code = "const count: number = 1;\nfunction f(x: string, y: number) {}";
        let stripped = strip_ts_annotations(code);
        assert!(!stripped.contains(": number"));
        assert!(!stripped.contains(": string"));
    }

    #[test]
    fn precompiles_calls_into_verb_target_tuples() {
        let tools = parse_step_calls("await page.click('swap-button');\nawait wallet.approve();");
        assert_eq!(
            tools,
            vec![
                AgentTool::Click { element_ref: "swap-button".to_string() },
                AgentTool::Approve,
            ]
        );
    }

    #[test]
    fn non_vocabulary_calls_are_ignored() {
        let tools = parse_step_calls("await expect(page.locator('e1')).toBeVisible();");
        assert!(tools.is_empty());
    }

    /// spec.md §4.4 scenario 2's literal step body — a realistic chained
    /// Playwright locator, not the flat invented-DSL form.
    #[test]
    fn parses_chained_playwright_locator_click() {
        let tools = parse_step_calls("await page.getByRole('button', { name: 'Swap' }).click();");
        assert_eq!(
            tools,
            vec![AgentTool::Click { element_ref: "getByRole('button', { name: 'Swap' })".to_string() }]
        );
    }

    #[test]
    fn parses_chained_locator_fill_and_flat_calls_in_order() {
        let tools = parse_step_calls(
            "await page.getByLabel('Amount').fill('1.5');\nawait wallet.approve();",
        );
        assert_eq!(
            tools,
            vec![
                AgentTool::Type { element_ref: "getByLabel('Amount')".to_string(), text: "1.5".to_string() },
                AgentTool::Approve,
            ]
        );
    }
}
