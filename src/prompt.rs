//! The fixed exam-writing prompt and the structured-output schema sent with it.

use serde_json::{json, Value};

use crate::domain::{Difficulty, QuestionType};

/// Instruction text plus the response schema for one generation.
#[derive(Clone, Debug)]
pub struct Prompt {
  pub instructions: String,
  pub schema: Value,
}

/// Inputs are assumed valid (see `GenerationRequest::new`).
pub fn build_prompt(difficulty: Difficulty, question_types: &[QuestionType], number_of_questions: u32) -> Prompt {
  Prompt {
    instructions: instruction_text(difficulty, question_types, number_of_questions),
    schema: response_schema(),
  }
}

fn instruction_text(difficulty: Difficulty, question_types: &[QuestionType], n: u32) -> String {
  let types = question_types.iter().map(|t| t.label()).collect::<Vec<_>>().join(", ");
  format!(
    r#"You are ExaPrep AI, an expert exam creator. Create a high-quality practice exam from the attached course material.

Instructions:
1. Analyze Material: read the attached file and identify its key concepts, vocabulary, subject matter and the language it is written in.
2. Language Matching: the exam (title, questions, options and answers) MUST be written in the same language as the course material.
3. Generate Questions: create exactly {n} new questions based on the material, numbered from 1.
4. Configuration:
   - Difficulty Level: {difficulty}. Question complexity and required knowledge must match this level.
   - Question Types: the exam must use the following types: {types}. Distribute them logically through the exam and use these exact labels in the questionType field.
5. Content Requirements:
   - Multiple choice questions: exactly 4 distinct options with one clear correct answer.
   - Short answer questions: require a concise, factual answer.
   - Long-form (essay) questions: pose an open-ended prompt that requires a detailed, structured response.
   - correctAnswer must be accurate for every question; for multiple choice it must repeat the full text of the correct option.
6. Output Format: respond strictly with JSON matching the requested schema. Do not wrap it in markdown code fences."#
  )
}

/// Gemini response schema (OpenAPI subset, upper-case type names).
pub fn response_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "title": {
        "type": "STRING",
        "description": "A relevant title for the exam based on the provided material."
      },
      "questions": {
        "type": "ARRAY",
        "description": "The exam questions.",
        "items": {
          "type": "OBJECT",
          "properties": {
            "questionNumber": { "type": "INTEGER", "description": "Sequential number of the question." },
            "questionText": { "type": "STRING", "description": "Full text of the question." },
            "questionType": { "type": "STRING", "description": "One of: 'MCQ', 'ShortAnswer', 'Essay'." },
            "options": {
              "type": "ARRAY",
              "description": "Exactly 4 options for MCQ questions; omitted for other types.",
              "items": { "type": "STRING" }
            },
            "correctAnswer": {
              "type": "STRING",
              "description": "The correct answer. For MCQ, the full text of the correct option."
            }
          },
          "required": ["questionNumber", "questionText", "questionType", "correctAnswer"]
        }
      }
    },
    "required": ["title", "questions"]
  })
}
