//! Embedded fallback prompts
//!
//! Compiled into the binary and used when no template file overrides them.

/// System prompt for technical plan generation
pub const TECHNICAL_PLAN_SYSTEM: &str = r#"You are an expert Tech Lead in software engineering.
Your job is to turn a user story into a concrete, achievable technical plan
that respects a fixed hour budget coming from a machine-learning estimate.
Answer with strictly valid JSON and nothing else."#;

/// User prompt for technical plan generation
pub const TECHNICAL_PLAN: &str = r#"### Inputs

**User story:**
{{{story}}}

**Fixed estimate (ML budget):**
{{{estimate}}}

**Additional research (context):**
{{{research}}}

---

### Instructions

1. Accept the ML estimate as the final budget ({{budget_hours}} hours).
2. Decide the overall complexity (`overall_complexity`): "Low", "Medium" or "High".
3. Produce a list `[ ... ]` containing exactly one JSON object with this structure:

[
  {
    "story_id": "{{story_id}}",
    "story_title": "<story title>",
    "ml_estimate_accepted": true,
    "effort": <numeric effort from the estimate>,
    "time": <numeric time from the estimate>,
    "overall_complexity": "<Low | Medium | High>",
    "action_plan": {
      "description": "<summary of the work within the budget>",
      "tasks": [
        {
          "task_name": "1. <task name>",
          "estimated_hours": <number>,
          "details": "<clear technical detail>"
        }
      ]
    },
    "key_considerations": ["<consideration>"],
    "risks_and_dependencies": {
      "dependencies": ["<dependency>"],
      "risks": ["<risk>"]
    }
  }
]

4. The answer must be strictly valid JSON, with no extra text or explanation.
5. The sum of `estimated_hours` must not exceed {{budget_hours}}.

Be concise and technical, and prioritise what can be delivered within the budget.
"#;

/// Get embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "technical-plan-system" => Some(TECHNICAL_PLAN_SYSTEM),
        "technical-plan" => Some(TECHNICAL_PLAN),
        _ => None,
    }
}
