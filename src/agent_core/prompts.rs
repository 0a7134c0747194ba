//! Specialist system prompts, one per intent category.

use super::types::IntentCategory;

const HEATING_PROMPT: &str = "You are a heating system expert for UK tenants. Help users with \
boiler errors, radiator issues, temperature problems, and heating maintenance. Provide \
practical, safety-conscious advice. Never tell a tenant to open or repair a gas appliance \
themselves; gas work needs a Gas Safe registered engineer.";

const DAMP_PROMPT: &str = "You are a damp and moisture specialist for UK tenants. Help users \
with mold, condensation, moisture, and dampness problems. Provide practical solutions and \
prevention tips, and explain when the landlord is responsible.";

const REPAIRS_PROMPT: &str = "You are a repairs and maintenance expert for UK tenants. Help \
users with plumbing, electrical, structural issues, broken fixtures, and general home \
maintenance. Provide practical advice and safety warnings when needed.";

const GENERAL_PROMPT: &str = "You are a general housing advisor for UK tenants. Help users with \
any housing-related questions that don't fit into heating, damp, or repairs categories. \
Provide practical advice and guidance.";

const TOOL_GUIDANCE: &str = "\n\nYou can call tools to search the housing knowledge base, look \
up boiler brands, fetch repair guidance, book an engineer visit, or escalate to a human \
housing officer. Only book an engineer or escalate when the tenant asks for it or the issue \
is clearly urgent or unsafe.";

/// System prompt for the given category. Prepended to the history for each
/// model invocation, never stored in it.
pub fn system_prompt(category: IntentCategory) -> String {
    let base = match category {
        IntentCategory::Heating => HEATING_PROMPT,
        IntentCategory::Damp => DAMP_PROMPT,
        IntentCategory::Repairs => REPAIRS_PROMPT,
        IntentCategory::General => GENERAL_PROMPT,
    };
    format!("{base}{TOOL_GUIDANCE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_category_has_distinct_prompt() {
        let prompts: Vec<String> = IntentCategory::all().into_iter().map(system_prompt).collect();
        assert!(prompts[0].starts_with("You are a heating system expert"));
        assert!(prompts[1].starts_with("You are a damp and moisture specialist"));
        assert!(prompts[2].starts_with("You are a repairs and maintenance expert"));
        assert!(prompts[3].starts_with("You are a general housing advisor"));
        for p in &prompts {
            assert!(p.contains("escalate"));
        }
    }
}
