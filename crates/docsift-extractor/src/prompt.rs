//! Prompt engineering for structured extraction

/// Builds the provider instruction for an extraction request
pub struct PromptBuilder {
    instruction: String,
}

impl PromptBuilder {
    /// Create a prompt builder from the caller's extraction instruction
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    /// Build the complete system instruction
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        // 1. Role and task framing
        prompt.push_str(EXTRACTION_PREAMBLE);
        prompt.push_str("\n\n");

        // 2. The caller's instruction
        prompt.push_str("Extraction task:\n");
        prompt.push_str(&self.instruction);
        prompt.push_str("\n\n");

        // 3. Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

const EXTRACTION_PREAMBLE: &str = "You are a structured data extraction engine. \
You will receive one fragment of a larger document. Extract only what the task \
asks for, using only information present in the fragment.";

const OUTPUT_FORMAT_REMINDER: &str = "Respond with the extracted data as JSON only. \
No prose, no explanations, no markdown fences. If the fragment contains nothing \
relevant, respond with an empty JSON object or array as appropriate.";
