use serde::{Deserialize, Serialize};

/// One line of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// Free-text patient utterance (the complaint).
    Patient { text: String },
    /// An assistant question and the answer the patient chose.
    Exchange {
        layer: usize,
        question: String,
        answer: String,
        note: Option<String>,
    },
}

impl TranscriptEntry {
    /// Line-per-turn rendering replayed to the model.
    pub fn render(&self) -> String {
        match self {
            Self::Patient { text } => format!("Patient: {text}"),
            Self::Exchange {
                question,
                answer,
                note: Some(note),
                ..
            } => format!("AI Question: {question} -> Patient: {answer} (Note: {note})"),
            Self::Exchange {
                question, answer, ..
            } => format!("AI Question: {question} -> Patient: {answer}"),
        }
    }
}

/// Append-only conversation log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_patient(&mut self, text: &str) {
        self.entries.push(TranscriptEntry::Patient {
            text: text.to_string(),
        });
    }

    pub fn push_exchange(&mut self, layer: usize, question: &str, answer: &str, note: Option<&str>) {
        self.entries.push(TranscriptEntry::Exchange {
            layer,
            question: question.to_string(),
            answer: answer.to_string(),
            note: note.map(str::to_string),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of question/answer exchanges recorded so far.
    pub fn answer_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Exchange { .. }))
            .count()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(TranscriptEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
