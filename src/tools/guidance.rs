//! `get_repair_guidance` — canned guidance per issue category.

use async_trait::async_trait;

use crate::agent_core::types::IntentCategory;

use super::{required_str, Tool, ToolError};

const TOOL_NAME: &str = "get_repair_guidance";

fn guidance_for(category: IntentCategory) -> &'static str {
    match category {
        IntentCategory::Heating => {
            "Heating and hot water:\n\
             - Check the boiler pressure gauge reads 1-1.5 bar; repressurise if low.\n\
             - Check the thermostat and timer settings and that the boiler has power.\n\
             - Bleed radiators that are cold at the top.\n\
             - Your landlord must keep heating and hot water in working order \
             (Landlord and Tenant Act 1985, s.11).\n\
             - Loss of heating or hot water in cold weather is usually treated as an \
             emergency repair.\n\
             Safety: never open a gas appliance. If you smell gas, call 0800 111 999."
        }
        IntentCategory::Damp => {
            "Damp and mould:\n\
             - Wipe condensation from windows and sills every morning.\n\
             - Ventilate: open trickle vents, use extractor fans when cooking and bathing.\n\
             - Keep a low, steady heat rather than short bursts.\n\
             - Treat small mould patches with a fungicidal wash; do not brush dry mould.\n\
             - Rising or penetrating damp, leaks and disrepair are the landlord's \
             responsibility; report them in writing with photos.\n\
             - Serious damp and mould is a Category 1 hazard under the Housing Health \
             and Safety Rating System."
        }
        IntentCategory::Repairs => {
            "Repairs:\n\
             - Report the repair to your landlord in writing and keep a copy.\n\
             - Turn off water at the stopcock for leaks; turn off electricity at the \
             consumer unit for exposed wiring or sparking sockets.\n\
             - Landlords must repair the structure, exterior, drains, pipes, sanitary \
             fittings and electrical installations.\n\
             - Allow reasonable access for inspection and repair.\n\
             - If repairs are ignored, contact your council's environmental health team."
        }
        IntentCategory::General => {
            "General housing advice:\n\
             - Keep records of all communication with your landlord.\n\
             - Your landlord must give at least 24 hours' written notice before visiting, \
             except in emergencies.\n\
             - Check your tenancy agreement for reporting procedures.\n\
             - Shelter, Citizens Advice and your local council offer free advice."
        }
    }
}

pub struct RepairGuidanceTool;

#[async_trait]
impl Tool for RepairGuidanceTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get repair guidance and safety information for a housing issue type \
         (heating, damp, repairs, general)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "issue_type": {
                    "type": "string",
                    "description": "The type of repair issue",
                    "enum": IntentCategory::all().iter().map(|c| c.as_str()).collect::<Vec<_>>()
                }
            },
            "required": ["issue_type"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let issue_type = required_str(arguments, "issue_type", TOOL_NAME)?;

        let category = IntentCategory::parse(issue_type).ok_or_else(|| ToolError::NotFound {
            what: format!("repair guidance for '{issue_type}'"),
            hint: Some(format!(
                "known issue types: {}",
                IntentCategory::all()
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        })?;

        Ok(format!(
            "Repair guidance for {}\n{}",
            category.as_str(),
            guidance_for(category)
        ))
    }
}
