use std::collections::BTreeMap;

use crate::model::{Answer, Question, QuestionId, QuestionKind, SubmittedAnswer};

/// Result of an attempted answer edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EditOutcome {
    Applied,
    /// The ledger is frozen for submission; nothing changed.
    Locked,
    UnknownQuestion,
    /// An MCQ answer was sent for an essay question or the other way round.
    KindMismatch,
}

impl EditOutcome {
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, EditOutcome::Applied)
    }
}

/// Frozen copy of the answer map taken at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerSnapshot {
    answers: BTreeMap<QuestionId, Answer>,
}

impl AnswerSnapshot {
    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Answer> {
        self.answers.get(&id)
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<QuestionId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Wire answers in question order, one entry per question.
    #[must_use]
    pub fn to_submitted(&self, questions: &[Question]) -> Vec<SubmittedAnswer> {
        questions
            .iter()
            .map(|q| {
                let answer = self.answers.get(&q.id);
                SubmittedAnswer {
                    question_id: q.id,
                    answer_index: answer.and_then(Answer::answer_index),
                    answer_text: answer.and_then(Answer::answer_text).map(str::to_owned),
                }
            })
            .collect()
    }
}

impl From<BTreeMap<QuestionId, Answer>> for AnswerSnapshot {
    fn from(answers: BTreeMap<QuestionId, Answer>) -> Self {
        Self { answers }
    }
}

/// Per-question answers for one session.
///
/// The ledger knows each question's kind so it can refuse mismatched edits,
/// but never grades.
#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    kinds: BTreeMap<QuestionId, bool>,
    answers: BTreeMap<QuestionId, Answer>,
    locked: bool,
}

impl AnswerLedger {
    #[must_use]
    pub fn new(questions: &[Question]) -> Self {
        let kinds = questions.iter().map(|q| (q.id, q.is_mcq())).collect();
        Self {
            kinds,
            answers: BTreeMap::new(),
            locked: false,
        }
    }

    pub fn set_mcq_answer(&mut self, question_id: QuestionId, index: Option<usize>) -> EditOutcome {
        if let Some(outcome) = self.reject(question_id, true) {
            return outcome;
        }
        self.answers
            .insert(question_id, Answer::Mcq { answer_index: index });
        EditOutcome::Applied
    }

    pub fn set_essay_answer(&mut self, question_id: QuestionId, text: impl Into<String>) -> EditOutcome {
        if let Some(outcome) = self.reject(question_id, false) {
            return outcome;
        }
        self.answers.insert(
            question_id,
            Answer::Essay {
                answer_text: text.into(),
            },
        );
        EditOutcome::Applied
    }

    /// Remove any stored answer for the question.
    pub fn clear_answer(&mut self, question_id: QuestionId) -> EditOutcome {
        if self.locked {
            return EditOutcome::Locked;
        }
        if !self.kinds.contains_key(&question_id) {
            return EditOutcome::UnknownQuestion;
        }
        self.answers.remove(&question_id);
        EditOutcome::Applied
    }

    fn reject(&self, question_id: QuestionId, wants_mcq: bool) -> Option<EditOutcome> {
        if self.locked {
            return Some(EditOutcome::Locked);
        }
        match self.kinds.get(&question_id) {
            None => Some(EditOutcome::UnknownQuestion),
            Some(is_mcq) if *is_mcq != wants_mcq => Some(EditOutcome::KindMismatch),
            Some(_) => None,
        }
    }

    #[must_use]
    pub fn answer(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    /// Whether the stored answer counts as a real attempt.
    ///
    /// Essays need non-blank text; MCQs need an index inside `options`.
    #[must_use]
    pub fn is_answered(&self, question: &Question) -> bool {
        is_answered(question, self.answers.get(&question.id))
    }

    #[must_use]
    pub fn answered_count(&self, questions: &[Question]) -> usize {
        questions.iter().filter(|q| self.is_answered(q)).count()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Copy of the current answers without locking.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        AnswerSnapshot {
            answers: self.answers.clone(),
        }
    }

    /// Lock the ledger and return the frozen answers.
    pub fn freeze(&mut self) -> AnswerSnapshot {
        self.locked = true;
        self.snapshot()
    }

    /// Unlock and put back exactly the answers that were frozen.
    pub fn restore(&mut self, snapshot: AnswerSnapshot) {
        self.answers = snapshot.answers;
        self.locked = false;
    }

    /// Replace answers wholesale, e.g. from a saved draft.
    ///
    /// Entries for unknown questions or of the wrong kind are dropped. Returns
    /// the number of answers kept; a locked ledger keeps nothing.
    pub fn load(&mut self, answers: BTreeMap<QuestionId, Answer>) -> usize {
        if self.locked {
            return 0;
        }
        let kinds = &self.kinds;
        self.answers = answers
            .into_iter()
            .filter(|(id, answer)| {
                kinds
                    .get(id)
                    .is_some_and(|is_mcq| *is_mcq == matches!(answer, Answer::Mcq { .. }))
            })
            .collect();
        self.answers.len()
    }
}

/// Free-standing answered check shared by the ledger and the scoring engine.
#[must_use]
pub fn is_answered(question: &Question, answer: Option<&Answer>) -> bool {
    match (&question.kind, answer) {
        (QuestionKind::Mcq { options, .. }, Some(Answer::Mcq { answer_index })) => {
            answer_index.is_some_and(|i| i < options.len())
        }
        (QuestionKind::Essay { .. }, Some(Answer::Essay { answer_text })) => {
            !answer_text.trim().is_empty()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;

    fn questions() -> Vec<Question> {
        vec![
            Question::mcq(
                QuestionId::new(1),
                "Pick",
                vec!["a".into(), "b".into(), "c".into()],
                1,
                "basics",
                Difficulty::Easy,
            ),
            Question::essay(
                QuestionId::new(2),
                "Explain",
                vec!["x".into(), "y".into()],
                "basics",
                Difficulty::Medium,
            ),
        ]
    }

    #[test]
    fn answered_rules_per_kind() {
        let qs = questions();
        let mut ledger = AnswerLedger::new(&qs);
        assert_eq!(ledger.answered_count(&qs), 0);

        assert!(ledger.set_mcq_answer(QuestionId::new(1), Some(7)).is_applied());
        assert!(!ledger.is_answered(&qs[0]), "out-of-range index is unanswered");
        assert!(ledger.set_mcq_answer(QuestionId::new(1), None).is_applied());
        assert!(!ledger.is_answered(&qs[0]));
        assert!(ledger.set_mcq_answer(QuestionId::new(1), Some(2)).is_applied());
        assert!(ledger.is_answered(&qs[0]));

        assert!(ledger.set_essay_answer(QuestionId::new(2), "   \n\t").is_applied());
        assert!(!ledger.is_answered(&qs[1]));
        assert!(ledger.set_essay_answer(QuestionId::new(2), " x ").is_applied());
        assert!(ledger.is_answered(&qs[1]));

        assert_eq!(ledger.answered_count(&qs), 2);
        assert_eq!(ledger.answered_count(&qs), 2);
    }

    #[test]
    fn rejects_unknown_and_mismatched_edits() {
        let qs = questions();
        let mut ledger = AnswerLedger::new(&qs);
        assert_eq!(
            ledger.set_mcq_answer(QuestionId::new(9), Some(0)),
            EditOutcome::UnknownQuestion
        );
        assert_eq!(
            ledger.set_essay_answer(QuestionId::new(1), "text"),
            EditOutcome::KindMismatch
        );
        assert_eq!(
            ledger.set_mcq_answer(QuestionId::new(2), Some(0)),
            EditOutcome::KindMismatch
        );
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn frozen_ledger_rejects_edits_and_restores_identically() {
        let qs = questions();
        let mut ledger = AnswerLedger::new(&qs);
        let _ = ledger.set_mcq_answer(QuestionId::new(1), Some(0));
        let _ = ledger.set_essay_answer(QuestionId::new(2), "draft");
        let before = ledger.snapshot();

        let frozen = ledger.freeze();
        assert_eq!(frozen, before);
        assert_eq!(
            ledger.set_essay_answer(QuestionId::new(2), "changed"),
            EditOutcome::Locked
        );
        assert_eq!(ledger.clear_answer(QuestionId::new(1)), EditOutcome::Locked);

        ledger.restore(frozen);
        assert!(!ledger.is_locked());
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn submitted_answers_follow_question_order() {
        let qs = questions();
        let mut ledger = AnswerLedger::new(&qs);
        let _ = ledger.set_essay_answer(QuestionId::new(2), "essay");
        let wire = ledger.snapshot().to_submitted(&qs);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].question_id, QuestionId::new(1));
        assert_eq!(wire[0].answer_index, None);
        assert_eq!(wire[0].answer_text, None);
        assert_eq!(wire[1].answer_text.as_deref(), Some("essay"));
    }

    #[test]
    fn load_drops_foreign_entries() {
        let qs = questions();
        let mut ledger = AnswerLedger::new(&qs);
        let mut draft = BTreeMap::new();
        draft.insert(QuestionId::new(1), Answer::Mcq { answer_index: Some(1) });
        draft.insert(
            QuestionId::new(1_000),
            Answer::Mcq {
                answer_index: Some(0),
            },
        );
        draft.insert(QuestionId::new(2), Answer::Mcq { answer_index: Some(0) });
        assert_eq!(ledger.load(draft), 1);
        assert!(ledger.is_answered(&qs[0]));
    }
}
