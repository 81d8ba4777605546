use super::TurnKind;
use crate::models::Transcript;

/// Fixed instruction describing the two allowed output shapes.
pub fn system_instruction(questions_per_layer: usize) -> String {
    format!(
        r#"You MUST return STRICT JSON only. Any other format is invalid.

You are a clinical triage assistant for a nurse.

You MUST follow these rules strictly:
1. Output ONLY valid JSON
2. Do NOT include explanations
3. Do NOT include markdown
4. Do NOT include <think> tags
5. Do NOT include text before or after JSON

If you can confidently make a final assessment based on the provided symptoms, output EXACTLY this JSON structure:
{{
  "type": "result",
  "risk_level": "LOW" | "MEDIUM" | "HIGH",
  "reason": "short explanation for the risk level",
  "action": "clear medical action to take (e.g. 'Refer to ER', 'Rest and monitor'). Never 'Ask for more information'; use type 'question' instead"
}}

If you DO NOT have enough information and must ask follow-up questions, output EXACTLY this JSON structure:
{{
  "type": "question",
  "risk_level": "LOW",
  "reason": "why more information is needed",
  "follow_up_questions": [
    {{
      "question": "What type of headache are you experiencing?",
      "priority": "HIGH",
      "expected_answers": ["Throbbing", "Dull ache", "Sharp", "Other"]
    }}
  ]
}}

Rules:
- Read the whole CONVERSATION TRANSCRIPT and judge the latest answers in its context.
- If the patient definitively reports chest pain or breathing problems anywhere in the transcript, return type "result" with risk_level "HIGH".
- If the combined symptoms are still vague, use the "question" structure. NEVER return type "result" while you still need to ask questions.
- When asking, generate EXACTLY {questions_per_layer} relevant, unique follow-up questions for these specific symptoms. Do NOT copy the example.
- Give each question a "priority" of "HIGH", "MEDIUM" or "LOW" according to how critical it is for triage.
- Each question has EXACTLY ONE "expected_answers" array of EXACTLY 4 items: 3 short, logical answers for that question, then the literal string "Other". Do not output placeholder tags.
- If uncertain about the final risk, choose the higher level."#
    )
}

const FINAL_TURN_INSTRUCTION: &str = "The question limit has been reached. \
You MUST now return the \"result\" structure. Do NOT ask further questions.";

/// Assemble the complete prompt for one turn.
pub fn build_turn_prompt(transcript: &Transcript, kind: TurnKind, questions_per_layer: usize) -> String {
    let mut prompt = system_instruction(questions_per_layer);
    if kind == TurnKind::Final {
        prompt.push_str("\n\n");
        prompt.push_str(FINAL_TURN_INSTRUCTION);
    }
    prompt.push_str("\n\nCONVERSATION TRANSCRIPT:\n");
    prompt.push_str(&transcript.render());
    prompt.push_str("\n\nRespond ONLY in JSON.\n");
    prompt
}
