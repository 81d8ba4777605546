use serde::{Deserialize, Serialize};

use crate::models::{Question, QuestionSet};

/// A question inside a layer, with its answer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerQuestion {
    /// Stable id, `L<layer>-Q<index>`, both 1-based.
    pub id: String,
    #[serde(flatten)]
    pub question: Question,
    pub answered: bool,
    pub selected_answer: Option<String>,
    pub note: Option<String>,
}

impl LayerQuestion {
    pub fn text(&self) -> &str {
        &self.question.text
    }
}

/// Questions issued together. Complete when every question is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub number: usize,
    pub reason: Option<String>,
    pub questions: Vec<LayerQuestion>,
}

impl Layer {
    pub fn from_set(number: usize, set: QuestionSet) -> Self {
        let questions = set
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, question)| LayerQuestion {
                id: question_id(number, i + 1),
                question,
                answered: false,
                selected_answer: None,
                note: None,
            })
            .collect();

        Self {
            number,
            reason: set.reason,
            questions,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.questions.iter().all(|q| q.answered)
    }

    /// Unanswered questions left in this layer.
    pub fn remaining(&self) -> usize {
        self.questions.iter().filter(|q| !q.answered).count()
    }

    pub fn question(&self, id: &str) -> Option<&LayerQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_mut(&mut self, id: &str) -> Option<&mut LayerQuestion> {
        self.questions.iter_mut().find(|q| q.id == id)
    }
}

pub fn question_id(layer: usize, index: usize) -> String {
    format!("L{layer}-Q{index}")
}
