//! Prompt assembly for requirements analysis.

use crate::RequirementsInput;

/// Instructions sent to the model when the caller supplies none.
///
/// Describes the exact JSON shape [`crate::extraction::extract_document`]
/// expects back.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"
Analyze the requirements document and extract ALL EPICS, STORIES, and SUBTASKS into JSON format.

IMPORTANT INSTRUCTIONS:
1. Extract ALL epics from the requirements (both FUNCTIONAL and NON-FUNCTIONAL categories)
2. For each epic, extract ALL stories listed under it
3. For each story, extract ALL subtasks listed under it
4. Maintain the category information (functional vs non-functional)
5. Preserve the priority levels mentioned in stories
6. Keep the exact structure and hierarchy from the requirements

Output Format:
{
  "epics": [
    {
      "summary": "Epic title from requirements",
      "description": "Epic description from requirements",
      "category": "FUNCTIONAL" or "NON-FUNCTIONAL",
      "epicNumber": "Epic number (e.g., 1, 2, 3...)",
      "stories": [
        {
          "summary": "Story title from requirements",
          "description": "Story description from requirements",
          "priority": "Priority level if mentioned (High/Medium/Low)",
          "storyNumber": "Story number within epic",
          "subtasks": [
            {
              "summary": "Subtask description from requirements",
              "subtaskNumber": "Subtask number"
            }
          ]
        }
      ]
    }
  ]
}

CRITICAL: Extract EVERY epic from the requirements document. Do not limit the number of epics.

Return ONLY valid JSON. No additional text or explanations.
"#;

/// Requirements text used when the caller uploaded images only.
pub const IMAGES_ONLY_REQUIREMENTS: &str = "The following upload contains only architecture \
diagrams or images. Analyze these diagrams carefully and extract ALL possible EPICS, STORIES, \
and SUBTASKS that could be inferred from the system, workflows, modules, integrations, or \
features depicted. If there are swimlanes, modules, or components, treat them as potential \
epics or stories. For each, provide a summary, description, and any subtasks that can be \
logically deduced. If you cannot extract anything, return an empty epics array.";

const REQUIREMENTS_HEADER: &str = "\n\n**Requirements:**\n";
const DIAGRAMS_HEADER: &str = "\n\n**Architecture Diagrams:**\n";

/// Builds the text part of a model request.
///
/// `custom` replaces `default_prompt` when present and non-blank. Images are
/// not embedded here; the model adapter appends them after this text, which
/// ends with the diagrams header whenever the input carries images.
pub fn build_prompt(
    default_prompt: &str,
    custom: Option<&str>,
    input: &RequirementsInput,
) -> String {
    let instructions = custom
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(default_prompt);
    let requirements = if input.text.trim().is_empty() {
        IMAGES_ONLY_REQUIREMENTS
    } else {
        input.text.as_str()
    };

    let mut prompt =
        String::with_capacity(instructions.len() + requirements.len() + DIAGRAMS_HEADER.len() + 32);
    prompt.push_str(instructions);
    prompt.push_str(REQUIREMENTS_HEADER);
    prompt.push_str(requirements);
    if !input.images.is_empty() {
        prompt.push_str(DIAGRAMS_HEADER);
    }
    prompt
}
