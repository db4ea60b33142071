use crate::error::QuizError;
use crate::history::Difficulty;
use crate::quiz::parser::parse_quiz_response;
use crate::quiz::Question;
use chatgpt::prelude::*;
use chatgpt::types::CompletionResponse;

pub struct QuizHelper {
    persona: Persona,
    chat_gpt: ChatGPT,
}

impl QuizHelper {
    pub fn new(chat_gpt: ChatGPT, persona: Persona) -> Self {
        Self { persona, chat_gpt }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let response: CompletionResponse = self.chat_gpt.send_message(prompt).await?;
        let content = response.message().clone().content;
        log::debug!("Completion: {:?}", content);
        Ok(content.trim().to_string())
    }

    /// Free-form question from a cadet, answered in the instructor's voice.
    pub async fn answer_cadet(&self, question: &str) -> Result<String> {
        log::info!("Answering cadet question ({} chars)", question.len());
        let prompt = format!(
            "You are {}, an assistant for National Cadet Corps (NCC) trainees in India.
        Answer the cadet's question accurately and briefly, using the NCC common syllabus where relevant.
        If the question is not about NCC, training, or general knowledge a cadet needs, politely steer back to NCC topics.

        Cadet's question: {}",
            self.persona.describe(),
            question
        );
        self.complete(&prompt).await
    }

    pub async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
        difficulty: Difficulty,
    ) -> std::result::Result<Vec<Question>, QuizError> {
        log::info!(
            "Generating {} {} questions about {:?}",
            count,
            difficulty,
            topic
        );
        let raw = self.complete(&build_quiz_prompt(topic, count, difficulty)).await?;
        let mut questions = parse_quiz_response(&raw);
        if questions.is_empty() {
            log::error!("Failed to parse quiz response: {:?}", raw);
            return Err(QuizError::NoValidQuestions);
        }
        questions.truncate(count);
        Ok(questions)
    }

    pub async fn explain_wrong_answer(&self, question: &Question, given: &str) -> Result<String> {
        log::info!("Explaining wrong answer for question: {:?}", question.text);
        let correct_answer = question.correct_answer().ok_or(chatgpt::err::Error::BackendError {
            message: "No correct answer found".to_string(),
            error_type: "QuizError".to_string(),
        })?;

        let prompt = format!(
            "You are {}, helping an NCC cadet learn from a quiz mistake.
        The question was: {}
        The cadet answered \"{}\", but the correct answer is \"{}\".
        Explain in 2-3 sentences why the correct answer is right, so the cadet remembers it next time.",
            self.persona.describe(),
            question.text,
            given,
            correct_answer.text
        );
        self.complete(&prompt).await
    }
}

pub fn build_quiz_prompt(topic: &str, count: usize, difficulty: Difficulty) -> String {
    format!(
        "Generate {count} multiple-choice questions about {topic} for NCC cadets.
Difficulty Level: {difficulty} ({})

For each question, follow this format exactly:

Q: [Your question]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
ANSWER: [Correct letter A-D]
EXPLANATION: [Brief explanation of the answer]

Make sure to:
1. Include exactly 4 options (A-D) for each question
2. Mark the correct answer with ANSWER: [letter]
3. Provide a clear explanation for each answer
4. Vary the position of the correct answer randomly
5. Ensure questions are {} difficulty
6. Cover different aspects of {topic}
7. Separate questions with a line containing only ---
",
        difficulty.describe(),
        difficulty.as_str().to_lowercase(),
    )
}

pub enum Persona {
    DrillInstructor,
    SeniorCadet,
}

impl Persona {
    pub fn describe(&self) -> &'static str {
        match self {
            Persona::DrillInstructor => "an experienced NCC drill instructor",
            Persona::SeniorCadet => "a friendly senior cadet (Senior Under Officer)",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "senior_cadet" | "cadet" => Persona::SeniorCadet,
            _ => Persona::DrillInstructor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_prompt_names_topic_count_and_tier() {
        let prompt = build_quiz_prompt("Map Reading", 3, Difficulty::Easy);
        assert!(prompt.starts_with("Generate 3 multiple-choice questions about Map Reading"));
        assert!(prompt.contains("Difficulty Level: Easy (suitable for beginners"));
        assert!(prompt.contains("questions are easy difficulty"));
        assert!(prompt.contains("ANSWER: [Correct letter A-D]"));
    }

    #[test]
    fn persona_defaults_to_instructor() {
        assert!(matches!(Persona::from_name("cadet"), Persona::SeniorCadet));
        assert!(matches!(Persona::from_name("unknown"), Persona::DrillInstructor));
    }
}
