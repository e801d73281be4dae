//! Auditor prompts: system instruction with embedded rules, user message
//! with the extracted media content.

/// System instruction for the judgment model. `{rules}` is replaced with the
/// retrieved rule documents joined by blank lines.
pub const AUDITOR_SYSTEM_TEMPLATE: &str = r#"You are a Senior Brand Compliance Auditor.

OFFICIAL REGULATORY RULES:
{rules}

INSTRUCTIONS:
1. Analyze the Transcript and OCR text below.
2. Identify ANY violations of the rules.
3. Return strictly JSON in the following format:

{
    "compliance_results": [
        {
            "category": "Claim Validation",
            "severity": "CRITICAL",
            "description": "Explanation of the violation..."
        }
    ],
    "status": "FAIL",
    "final_report": "Summary of findings..."
}

If no violations are found, set "status" to "PASS" and "compliance_results" to []."#;

/// User message template: metadata, transcript, and OCR text are embedded verbatim.
pub const AUDITOR_USER_TEMPLATE: &str = r#"VIDEO METADATA: {metadata}
TRANSCRIPT: {transcript}
ON-SCREEN TEXT (OCR): {ocr}"#;

/// Build the system instruction around the retrieved rules.
pub fn auditor_system_prompt(rules: &str) -> String {
    AUDITOR_SYSTEM_TEMPLATE.replace("{rules}", rules)
}

/// Build the user message from the extracted media content.
pub fn auditor_user_prompt(metadata: &str, transcript: &str, ocr: &str) -> String {
    AUDITOR_USER_TEMPLATE
        .replace("{metadata}", metadata)
        .replace("{transcript}", transcript)
        .replace("{ocr}", ocr)
}
