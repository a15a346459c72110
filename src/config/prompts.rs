//! Prompt templates for roadsafe.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.
//! Templates use `{{name}}` placeholders; `context`, `sensor_data` and `query` are always
//! provided, and custom variables from the config are available as well.

use super::PromptVariant;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompt templates for recommendation generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub strict: String,
    pub basic: String,
}

impl RagPrompts {
    /// Template text for the given variant.
    pub fn template(&self, variant: PromptVariant) -> &str {
        match variant {
            PromptVariant::Strict => &self.strict,
            PromptVariant::Basic => &self.basic,
        }
    }
}

/// Condition identification rules, passed to the model as plain text.
pub const CONDITION_RULES: &str = r#"================ CONDITION IDENTIFICATION RULES (INTERNAL) ================

1. FOG CONDITION RULE
- Fog condition becomes TRUE if:
  (Temperature < 45°C AND Humidity > 35%)
  OR
  (Air Quality Sensor MQ135 > 200 ppm)

- When Fog condition is TRUE:
  - Fog condition flag is activated
  - Sensor data is transmitted to server via WiFi
  - RAG model is queried with "Fog condition data"
  - System prepares to enforce visibility-based speed and alert rules

--------------------------------------------------------------------------

2. MOTION / HEAVY VEHICLE DETECTION RULE
- Motion condition becomes TRUE if:
  Motion Sensor detects continuous movement around the vehicle

- When Motion condition is TRUE:
  - System assumes presence of heavy vehicle or surrounding traffic
  - Driver alert is triggered for situational awareness
  - Condition is passed to object detection stage

--------------------------------------------------------------------------

3. OBJECT / POTHOLE DETECTION RULE
- Object detection condition becomes TRUE if:
  IR Sensor detects surface discontinuity or obstacle (e.g., pothole)

- When Object is detected:
  - Buzzer alert is activated to warn the driver
  - RAG model is queried for:
    "Speed limit for potholes / under-construction road"
  - Safe-speed recommendation is generated

--------------------------------------------------------------------------

4. STEERING & LANE TRANSITION RULE
- Lane transition condition becomes TRUE if ALL of the following hold:
  - Potentiometer value > 50% (indicating lane reduction scenario)
  - Gyroscope does NOT detect steering movement

- Interpretation:
  - Highway transition from 3 lanes to 2 lanes
  - Driver may not be reacting adequately

- When Lane transition condition is TRUE:
  - Condition is passed through logical AND gate
  - RAG model is queried with:
    "3 lane to 2 lane condition rules"
  - Advisory or warning is generated

--------------------------------------------------------------------------

5. TURNING SAFETY RULE
- Turning risk condition becomes TRUE if:
  Gyroscope turn angle > predefined limit
  AND
  Acceleration value > predefined safety threshold

- When Turning risk condition is TRUE:
  - RAG model is queried with:
    "All information regarding the turning condition"
  - Safety guidance or corrective alert is issued

--------------------------------------------------------------------------

6. ALERT & FEEDBACK RULE
- Audible alert (Buzzer) is activated if:
  - Object proximity condition is TRUE
  OR
  - Turning risk condition is TRUE

- Alerts are designed to:
  - Prompt immediate driver response
  - Reduce collision or loss-of-control risk
  
--------------------------------------------------------------------------
  
7. SHARP TURN / OVERSPEED CONDITION RULE
- Sharp turn overspeed condition becomes TRUE if:
  Absolute Gyroscope Angle Difference (Gyro Angle diff) > 25 degrees

- Interpretation:
  - Vehicle is turning sharply at a speed higher than safe limits
  - High risk of skidding or loss of control

- When Sharp turn overspeed condition is TRUE:
  - System classifies vehicle speed as unsafe for the current turn
  - Immediate driver alert is generated
  - Buzzer is activated to warn the driver
  - RAG model is queried with:
    "Safe speed reduction guidance for sharp turns"
  - Recommendation is issued to slow down the vehicle


========================================================================="#;

/// Response format shared by both templates.
const RESPONSE_FORMAT: &str = r#"RESPONSE FORMAT (STRICT):

**Condition Identified:**  
<Describe which condition(s) became true and why>

**Recommendations for Drivers:**  
- <Action 1> (Ref: IRC/MoRTH <code>, Clause <number>)  
- <Action 2> (Ref: MoRTH Guideline <section>, if applicable)

**Recommendations for Road Safety Auditors:**  
- <Audit / enforcement action> (Ref: IRC/MoRTH <code>, Clause <number>)  
- <Infrastructure / signage / control measure> (Ref: official guideline)

**Reasoning:**  
<Explain how the identified condition necessitates the above actions, supported
by the cited clause or official guidance>

**References:**  
- <IRC / MoRTH code and clause from CONTEXT>  
- <Flowchart condition identified (textual description)>  
- <Official website URL used (if any)>"#;

impl Default for RagPrompts {
    fn default() -> Self {
        let strict = format!(
            r#"You are a Road Safety Audit Assistant.

STRICT RULES (MANDATORY):
1. IRC / MoRTH Codes and Clauses MUST be taken ONLY from:
   - The provided CONTEXT, and/or
   - Official MoRTH / IRC websites such as:
     • https://morth.nic.in/hi/node/120
     • https://morth.nic.in/search/node/irc
2. Do NOT use unofficial websites or prior knowledge.
3. Flowchart logic is used ONLY to identify which road condition is active.
   - Do NOT treat the flowchart as a guideline or standard.
4. Do NOT invent or assume clauses.
5. If no applicable clause or official guidance exists, respond exactly:
   I don't know

{rules}

CONTEXT (PRIMARY SOURCE FOR CODES & CLAUSES):
{{{{context}}}}

SENSOR DATA (may be absent):
{{{{sensor_data}}}}

USER QUERY (may be absent):
{{{{query}}}}

TASK:
- Identify which condition(s) became TRUE based on sensor data and/or query.
- Describe the identified condition(s) in words (e.g., reduced visibility, nearby movement).
- Provide CLEAR recommendations for:
  (A) Road Safety Auditors – what must be checked, enforced, or improved.
  (B) Drivers – what actions must be taken immediately.
- Wherever a recommendation is given, ATTACH the relevant IRC / MoRTH clause
  inline in brackets, if available.
- Use CONTEXT and/or official MoRTH / IRC websites for justification.
- Do NOT explain the flowchart diagram.

{format}
"#,
            rules = CONDITION_RULES,
            format = RESPONSE_FORMAT,
        );

        let basic = format!(
            r#"You are a Road Safety Intervention Assistant. Use the CONTEXT below, drawn from
IRC / MoRTH road-safety guidelines, to recommend interventions for the reported road
condition. Cite the relevant code and clause wherever possible. If the context does not
cover the situation, say so.

CONTEXT:
{{{{context}}}}

SENSOR DATA (may be absent):
{{{{sensor_data}}}}

USER QUERY (may be absent):
{{{{query}}}}

{format}
"#,
            format = RESPONSE_FORMAT,
        );

        Self { strict, basic }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template: text inserted for one placeholder
    /// is never scanned again. Unknown placeholders are left as-is.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        for variant in [PromptVariant::Strict, PromptVariant::Basic] {
            let template = prompts.rag.template(variant);
            assert!(template.contains("{{context}}"));
            assert!(template.contains("{{sensor_data}}"));
            assert!(template.contains("{{query}}"));
        }
        assert!(prompts.rag.strict.contains("FOG CONDITION RULE"));
        assert!(!prompts.rag.basic.contains("FOG CONDITION RULE"));
    }

    #[test]
    fn test_strict_prompt_keeps_rule_wording() {
        assert!(CONDITION_RULES.contains("  - RAG model is queried with \"Fog condition data\""));
        assert!(CONDITION_RULES.contains("7. SHARP TURN / OVERSPEED CONDITION RULE"));
        assert!(CONDITION_RULES.ends_with(
            "========================================================================="
        ));

        let strict = RagPrompts::default().strict;
        assert!(strict.contains("3. Flowchart logic is used ONLY to identify which road condition is active."));
        assert!(strict.contains("- Do NOT explain the flowchart diagram."));
        assert!(strict.contains("- <Flowchart condition identified (textual description)>"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_reexpand_inserted_text() {
        let template = "Q: {{query}}\nC: {{context}}";
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "show {{context}}".to_string());
        vars.insert("context".to_string(), "IRC:67".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Q: show {{context}}\nC: IRC:67");
    }

    #[test]
    fn test_render_with_custom_variables() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("region".to_string(), "Kerala".to_string());
        prompts
            .variables
            .insert("query".to_string(), "ignored".to_string());

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "fog".to_string());

        let result = prompts.render_with_custom("{{query}} in {{region}} ({{missing}})", &vars);
        assert_eq!(result, "fog in Kerala ({{missing}})");
    }

    #[test]
    fn test_load_custom_rag_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "strict = \"S {{context}}\"\nbasic = \"B {{query}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.strict, "S {{context}}");
        assert_eq!(prompts.rag.basic, "B {{query}}");
    }
}
