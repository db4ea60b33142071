use rand::seq::SliceRandom;
use rand::Rng;

use super::{Answer, Question};

/// Chapters of the NCC common syllabus, offered as quiz topics.
pub const TOPICS: [&str; 14] = [
    "NCC",
    "National Integration",
    "Foot Drill",
    "Drill with Arms, Ceremonial Drill",
    "Weapon Training",
    "Leadership",
    "Civil Affairs/Disaster Management",
    "Social Service",
    "Health and Hygiene",
    "Adventure Activities",
    "Environment and Ecology",
    "Self Defence",
    "Posture Training",
    "Miscellaneous",
];

pub fn find_topic(reply: &str) -> Option<&'static str> {
    let reply = reply.trim();
    TOPICS.iter().copied().find(|t| t.eq_ignore_ascii_case(reply))
}

struct BankQuestion {
    text: &'static str,
    options: [&'static str; 4],
    correct: usize,
    explanation: &'static str,
}

const OFFLINE_BANK: [BankQuestion; 5] = [
    BankQuestion {
        text: "What does NCC stand for?",
        options: [
            "National Cadet Corps",
            "National Civil Corps",
            "Naval Cadet Corps",
            "National Community Corps",
        ],
        correct: 0,
        explanation: "NCC stands for National Cadet Corps, established in 1948.",
    },
    BankQuestion {
        text: "What is the NCC motto?",
        options: [
            "Unity and Discipline",
            "Service and Sacrifice",
            "Discipline and Unity",
            "Honor and Duty",
        ],
        correct: 0,
        explanation: "The NCC motto is 'Unity and Discipline'.",
    },
    BankQuestion {
        text: "NCC was established in which year?",
        options: ["1947", "1948", "1949", "1950"],
        correct: 1,
        explanation: "NCC was established on 15 July 1948.",
    },
    BankQuestion {
        text: "What are the three wings of NCC?",
        options: [
            "Army, Navy, Air Force",
            "Junior, Senior, Special",
            "Basic, Advanced, Expert",
            "Training, Service, Combat",
        ],
        correct: 0,
        explanation: "NCC has three wings: Army, Navy, and Air Force.",
    },
    BankQuestion {
        text: "What is the aim of NCC?",
        options: [
            "Military training only",
            "Character building and nation building",
            "Physical fitness only",
            "Academic excellence",
        ],
        correct: 1,
        explanation: "The aim of NCC is to develop character, comradeship, discipline, and spirit of adventure among youth.",
    },
];

/// Questions that need no model: a random pick from the built-in bank, with
/// options shuffled so the right one isn't always first.
pub fn offline_questions<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Question> {
    let mut picked: Vec<&BankQuestion> = OFFLINE_BANK.iter().collect();
    picked.shuffle(rng);
    picked
        .into_iter()
        .take(count)
        .map(|q| {
            let mut answers: Vec<Answer> = q
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| Answer::new(option.to_string(), i == q.correct))
                .collect();
            answers.shuffle(rng);
            Question::new(q.text.to_string(), answers).with_explanation(q.explanation)
        })
        .collect()
}
