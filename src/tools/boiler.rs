//! `get_boiler_info` — static facts for the common UK boiler brands.

use async_trait::async_trait;

use super::{required_str, Tool, ToolError};

const TOOL_NAME: &str = "get_boiler_info";

struct BoilerBrand {
    name: &'static str,
    aliases: &'static [&'static str],
    headquarters: &'static str,
    typical_models: &'static [&'static str],
    fault_codes: &'static [(&'static str, &'static str)],
    support_line: &'static str,
}

static BRANDS: &[BoilerBrand] = &[
    BoilerBrand {
        name: "Worcester Bosch",
        aliases: &["worcester", "bosch", "worcester bosch", "worcester-bosch"],
        headquarters: "Worcester, England",
        typical_models: &["Greenstar 4000", "Greenstar 8000 Life", "Greenstar 2000"],
        fault_codes: &[
            ("EA", "no flame detected; check gas supply and reset"),
            ("A1", "low water pressure; repressurise to 1-1.5 bar"),
            ("D5", "external flow sensor fault; engineer required"),
        ],
        support_line: "0330 123 9339",
    },
    BoilerBrand {
        name: "Vaillant",
        aliases: &["vaillant"],
        headquarters: "Remscheid, Germany (UK office: Belper, Derbyshire)",
        typical_models: &["ecoTEC plus", "ecoTEC pro", "ecoFIT pure"],
        fault_codes: &[
            ("F22", "low water pressure; repressurise the system"),
            ("F28", "ignition failure; check gas supply"),
            ("F75", "pump or pressure sensor fault; engineer required"),
        ],
        support_line: "0344 693 3133",
    },
    BoilerBrand {
        name: "Baxi",
        aliases: &["baxi"],
        headquarters: "Warwick, England",
        typical_models: &["Baxi 800", "Baxi 600", "Platinum+"],
        fault_codes: &[
            ("E119", "low water pressure; repressurise the system"),
            ("E133", "ignition failure; check gas supply and reset"),
            ("E168", "ignition fault persisting after reset; engineer required"),
        ],
        support_line: "0344 871 1525",
    },
    BoilerBrand {
        name: "Ideal",
        aliases: &["ideal", "ideal heating", "ideal boilers"],
        headquarters: "Hull, England",
        typical_models: &["Logic Max", "Vogue Max", "Exclusive 2"],
        fault_codes: &[
            ("F1", "low water pressure; repressurise the system"),
            ("L2", "ignition lockout; check gas supply and reset"),
            ("F2", "loss of flame; engineer required if repeated"),
        ],
        support_line: "01482 498 663",
    },
    BoilerBrand {
        name: "Viessmann",
        aliases: &["viessmann", "viesmann"],
        headquarters: "Allendorf, Germany (UK office: Telford, Shropshire)",
        typical_models: &["Vitodens 100-W", "Vitodens 050-W", "Vitodens 200-W"],
        fault_codes: &[
            ("F2", "burner fault; reset, then call an engineer"),
            ("F4", "no flame signal; check gas supply"),
            ("0A", "low water pressure; repressurise the system"),
        ],
        support_line: "01952 675 000",
    },
    BoilerBrand {
        name: "Glow-worm",
        aliases: &["glow-worm", "glowworm", "glow worm"],
        headquarters: "Belper, Derbyshire, England",
        typical_models: &["Energy", "Ultimate 3", "Easicom 3"],
        fault_codes: &[
            ("F22", "low water pressure; repressurise the system"),
            ("F28", "ignition failure; check gas supply"),
            ("F29", "flame loss; engineer required if repeated"),
        ],
        support_line: "0330 100 7679",
    },
    BoilerBrand {
        name: "Potterton",
        aliases: &["potterton"],
        headquarters: "Warwick, England",
        typical_models: &["Assure", "Titanium", "Ultra"],
        fault_codes: &[
            ("E119", "low water pressure; repressurise the system"),
            ("E133", "ignition failure; check gas supply and reset"),
            ("E160", "fan fault; engineer required"),
        ],
        support_line: "0344 871 1560",
    },
];

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Look up a brand by name or alias, case-insensitively. Trailing words such
/// as "boiler" are tolerated ("Worcester boiler" resolves).
fn find_brand(input: &str) -> Option<&'static BoilerBrand> {
    let wanted = normalize(input);
    let wanted = wanted
        .trim_end_matches(" boilers")
        .trim_end_matches(" boiler")
        .trim();

    BRANDS.iter().find(|brand| {
        normalize(brand.name) == wanted || brand.aliases.iter().any(|alias| *alias == wanted)
    })
}

fn render(brand: &BoilerBrand) -> String {
    let mut out = format!("Boiler information for {}\n", brand.name);
    out.push_str(&format!("Headquarters: {}\n", brand.headquarters));
    out.push_str(&format!("Typical models: {}\n", brand.typical_models.join(", ")));
    out.push_str("Common fault codes:\n");
    for (code, meaning) in brand.fault_codes {
        out.push_str(&format!("- {code}: {meaning}\n"));
    }
    out.push_str(&format!("Manufacturer support line: {}\n", brand.support_line));
    out.push_str(
        "Safety: if you smell gas, turn off the supply and call the National Gas \
         Emergency line on 0800 111 999. Only Gas Safe registered engineers may work \
         on gas appliances.",
    );
    out
}

pub struct BoilerInfoTool;

#[async_trait]
impl Tool for BoilerInfoTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get information about a specific boiler brand: typical models, common fault \
         codes and the manufacturer support line."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "boiler_brand": {
                    "type": "string",
                    "description": "The brand of boiler (e.g., Baxi, Vaillant, Worcester)"
                }
            },
            "required": ["boiler_brand"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let requested = required_str(arguments, "boiler_brand", TOOL_NAME)?;

        match find_brand(requested) {
            Some(brand) => Ok(render(brand)),
            None => Err(ToolError::NotFound {
                what: format!("boiler brand '{requested}'"),
                hint: Some(format!(
                    "known brands: {}",
                    BRANDS.iter().map(|b| b.name).collect::<Vec<_>>().join(", ")
                )),
            }),
        }
    }
}
