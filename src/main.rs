mod chat;
mod config;
mod context;
mod cooldown;
mod error;
mod history;
mod offline;
mod quiz;
mod storage;

use std::sync::Arc;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, UserId},
};

use chat::ChatExchange;
use config::AppConfig;
use context::{AppContext, Delivery, ProgressSummary};
use history::now_timestamp;
use history::remote::FirestoreClient;
use quiz::ai_helper::{Persona, QuizHelper};
use quiz::bank::{find_topic, TOPICS};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Context = Arc<AppContext<FirestoreClient>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveFullName,
    ReceiveMenuChoice,
    ReceiveTopic,
    ReceiveAmountOfQuestions {
        topic: String,
    },
    Quiz {
        quiz: quiz::Quiz,
    },
    Chat,
    ReceiveFeedback,
}

type DialogueStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting NCC ABYAS bot...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return;
        }
    };

    let bot = Bot::from_env();

    log::info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = match SqliteStorage::open(&config.dialogue_db, Json).await {
        Ok(storage) => storage.erase(),
        Err(e) => {
            log::error!("Could not open dialogue storage: {}", e);
            return;
        }
    };

    let helper = match &config.chatgpt_api_key {
        Some(key) => match ChatGPT::new(key.clone()) {
            Ok(mut gpt) => {
                gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
                gpt.config.timeout = config.ai_timeout;
                let persona = Persona::from_name(config.persona.as_deref().unwrap_or_default());
                Some(QuizHelper::new(gpt, persona))
            }
            Err(e) => {
                log::error!("Unable to set up the assistant model: {}", e);
                None
            }
        },
        None => {
            log::warn!("CHATGPT_API_KEY is not set, using offline answers and questions");
            None
        }
    };

    let remote = config.firebase.as_ref().map(FirestoreClient::new);
    if remote.is_none() {
        log::warn!("FIREBASE_PROJECT_ID is not set, cloud writes will stay queued");
    }
    if config.offline_mode {
        log::warn!("Offline mode is on");
    }

    let ctx: Context = Arc::new(AppContext::new(config, helper, remote));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::filter(|msg: Message| msg.text() == Some("/start")).endpoint(start))
            .branch(dptree::filter(|msg: Message| msg.text() == Some("/menu")).endpoint(show_menu))
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveFullName].endpoint(receive_full_name))
            .branch(dptree::case![State::ReceiveMenuChoice].endpoint(receive_menu_choice))
            .branch(dptree::case![State::ReceiveTopic].endpoint(receive_topic))
            .branch(
                dptree::case![State::ReceiveAmountOfQuestions { topic }]
                    .endpoint(receive_amount_of_questions),
            )
            .branch(dptree::case![State::Quiz { quiz }].endpoint(run_quiz))
            .branch(dptree::case![State::Chat].endpoint(chat_with_assistant))
            .branch(dptree::case![State::ReceiveFeedback].endpoint(receive_feedback)),
    )
    .dependencies(dptree::deps![storage, ctx])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Jai Hind! I'm NCC ABYAS, your training buddy for the NCC syllabus. Let's get acquainted! What's your name?";

const TAKE_QUIZ: &str = "📝 Take a quiz";
const ASK_ASSISTANT: &str = "💬 Ask the assistant";
const MY_PROGRESS: &str = "📊 My progress";
const SYNC_NOW: &str = "🔄 Sync now";
const SEND_FEEDBACK: &str = "✉️ Send feedback";
const CLEAR_HISTORY: &str = "🗑 Clear quiz history";
const VIEW_CHATS: &str = "📜 Chat history";
const CLEAR_CHATS: &str = "🧹 Clear chat history";
const BACK_TO_MENU: &str = "⬅️ Back to menu";

const CHAT_HISTORY_SHOWN: usize = 10;

fn user_id(msg: &Message) -> String {
    user_key(msg.from().map(|user| user.id), msg.chat.id)
}

/// Data is kept per sender, so members of a group chat don't share a history.
fn user_key(sender: Option<UserId>, chat: ChatId) -> String {
    match sender {
        Some(user) => user.0.to_string(),
        None => chat.0.to_string(),
    }
}

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(TAKE_QUIZ), KeyboardButton::new(ASK_ASSISTANT)],
        vec![KeyboardButton::new(MY_PROGRESS), KeyboardButton::new(SYNC_NOW)],
        vec![KeyboardButton::new(VIEW_CHATS), KeyboardButton::new(CLEAR_CHATS)],
        vec![
            KeyboardButton::new(SEND_FEEDBACK),
            KeyboardButton::new(CLEAR_HISTORY),
        ],
    ])
}

fn back_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(BACK_TO_MENU)]])
}

async fn start(bot: Bot, dialogue: QuizDialogue, ctx: Context, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    // Anything left over from an offline session goes out now.
    match ctx.sync_now(&user_id(&msg)).await {
        Ok(Some((synced, _))) if synced > 0 => {
            bot.send_message(
                msg.chat.id,
                format!("By the way, I synced {} item(s) you saved while offline.", synced),
            )
            .await?;
        }
        Ok(_) => {}
        Err(e) => log::warn!("Sync on start failed: {}", e),
    }

    dialogue.update(State::ReceiveFullName).await?;
    Ok(())
}

async fn receive_full_name(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(full_name) => {
            bot.send_message(msg.chat.id, format!("Nice to meet you, Cadet {}!", full_name.trim()))
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please type your name (as text)")
                .await?;
            return Ok(());
        }
    }

    bot.send_message(msg.chat.id, "What would you like to do?")
        .reply_markup(menu_keyboard())
        .await?;

    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

async fn show_menu(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "What would you like to do?")
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

async fn receive_menu_choice(
    bot: Bot,
    dialogue: QuizDialogue,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    let user = user_id(&msg);
    match msg.text() {
        Some(TAKE_QUIZ) => {
            let difficulty = ctx.next_difficulty(&user).await;
            let keyboard = KeyboardMarkup::new(
                TOPICS
                    .chunks(2)
                    .map(|row| row.iter().map(|t| KeyboardButton::new(*t)).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            );
            bot.send_message(
                msg.chat.id,
                format!(
                    "Your next quiz will be {} ({}). Pick a topic:",
                    difficulty,
                    difficulty.describe()
                ),
            )
            .reply_markup(keyboard)
            .await?;
            dialogue.update(State::ReceiveTopic).await?;
        }
        Some(ASK_ASSISTANT) => {
            bot.send_message(
                msg.chat.id,
                "Ask me anything about NCC: drill, ranks, weapon training, map reading...",
            )
            .reply_markup(back_keyboard())
            .await?;
            dialogue.update(State::Chat).await?;
        }
        Some(MY_PROGRESS) => {
            let summary = ctx.progress(&user).await;
            bot.send_message(msg.chat.id, format_progress(&summary))
                .reply_markup(menu_keyboard())
                .await?;
        }
        Some(SYNC_NOW) => {
            let text = match ctx.sync_now(&user).await {
                Ok(None) => "You're offline, nothing can be synced right now.".to_string(),
                Ok(Some((0, failed))) if failed.is_empty() => "Everything is already synced.".to_string(),
                Ok(Some((synced, failed))) if failed.is_empty() => {
                    format!("✅ Synced {} item(s) successfully!", synced)
                }
                Ok(Some((synced, failed))) => format!(
                    "Synced {} item(s), {} failed and will be retried next time.",
                    synced,
                    failed.len()
                ),
                Err(e) => {
                    log::error!("Sync failed for {}: {}", user, e);
                    "Could not read the offline queue, please try again later.".to_string()
                }
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(menu_keyboard())
                .await?;
        }
        Some(SEND_FEEDBACK) => {
            bot.send_message(msg.chat.id, "Tell us what you think of NCC ABYAS:")
                .reply_markup(back_keyboard())
                .await?;
            dialogue.update(State::ReceiveFeedback).await?;
        }
        Some(CLEAR_HISTORY) => {
            let text = match ctx.clear_history(&user) {
                Ok(()) => "Your local quiz history has been cleared.",
                Err(e) => {
                    log::error!("Failed to clear quiz history for {}: {}", user, e);
                    "Could not clear your quiz history, please try again later."
                }
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(menu_keyboard())
                .await?;
        }
        Some(VIEW_CHATS) => {
            let history = ctx.chat_history(&user, CHAT_HISTORY_SHOWN);
            bot.send_message(msg.chat.id, format_chat_history(&history))
                .reply_markup(menu_keyboard())
                .await?;
        }
        Some(CLEAR_CHATS) => {
            let text = match ctx.clear_chat_history(&user) {
                Ok(()) => "Your chat history has been cleared.",
                Err(e) => {
                    log::error!("Failed to clear chat history for {}: {}", user, e);
                    "Could not clear your chat history, please try again later."
                }
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(menu_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .reply_markup(menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

fn format_chat_history(history: &[ChatExchange]) -> String {
    if history.is_empty() {
        return "No chat history available yet.".to_string();
    }

    let mut text = String::from("📜 Recent conversations:");
    for exchange in history {
        let when = exchange.timestamp.get(..16).unwrap_or(&exchange.timestamp);
        text.push_str(&format!(
            "\n\n🕒 {}\nYou: {}\nAssistant: {}",
            when.replace('T', " "),
            exchange.prompt,
            exchange.response
        ));
    }
    text
}

fn format_progress(summary: &ProgressSummary) -> String {
    if summary.attempts == 0 {
        return format!(
            "No quizzes yet. Your first quiz will be {}.",
            summary.next_difficulty
        );
    }

    let mut lines = vec![
        format!("📊 Quizzes taken: {}", summary.attempts),
        format!(
            "Average score: {:.1}%",
            summary.overall_average.unwrap_or_default()
        ),
        format!(
            "Last {} average: {:.1}%",
            summary.recent.len(),
            summary.recent_average.unwrap_or_default()
        ),
        format!("Next difficulty: {}", summary.next_difficulty),
        String::new(),
        "Recent quizzes:".to_string(),
    ];
    for entry in summary.recent.iter().rev() {
        let date = entry.timestamp.get(..10).unwrap_or(&entry.timestamp);
        lines.push(format!(
            "• {} {} ({}): {:.1}%",
            date, entry.topic, entry.difficulty, entry.score
        ));
    }
    if summary.pending_sync > 0 {
        lines.push(String::new());
        lines.push(format!("📦 {} item(s) waiting to sync", summary.pending_sync));
    }
    if !summary.remote_reachable {
        lines.push("(Cloud history unavailable, showing this device only)".to_string());
    }
    lines.join("\n")
}

async fn receive_topic(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let Some(topic) = msg.text().and_then(find_topic) else {
        bot.send_message(msg.chat.id, "Please pick one of the topics")
            .await?;
        return Ok(());
    };

    let keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("3")],
        vec![KeyboardButton::new("5")],
        vec![KeyboardButton::new("8")],
        vec![KeyboardButton::new("10")],
    ]);
    bot.send_message(msg.chat.id, "How many questions?")
        .reply_markup(keyboard)
        .await?;
    dialogue
        .update(State::ReceiveAmountOfQuestions {
            topic: topic.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_amount_of_questions(
    bot: Bot,
    dialogue: QuizDialogue,
    topic: String,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    let Some(amount) = msg.text().and_then(|t| t.trim().parse::<usize>().ok()) else {
        bot.send_message(msg.chat.id, "Please enter a number").await?;
        return Ok(());
    };
    if amount == 0 {
        bot.send_message(msg.chat.id, "The number of questions can't be 0")
            .await?;
        return Ok(());
    }

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    let quiz = match ctx.build_quiz(&user_id(&msg), &topic, amount).await {
        Ok(quiz) => quiz,
        Err(cooldown) => {
            bot.send_message(msg.chat.id, cooldown.to_string())
                .reply_markup(menu_keyboard())
                .await?;
            dialogue.update(State::ReceiveMenuChoice).await?;
            return Ok(());
        }
    };
    if quiz.questions.is_empty() {
        bot.send_message(msg.chat.id, "Couldn't prepare any questions, please try again.")
            .reply_markup(menu_keyboard())
            .await?;
        dialogue.update(State::ReceiveMenuChoice).await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        format!(
            "Great! {} quiz on {}, {} question(s). Let's begin!",
            quiz.difficulty,
            quiz.topic,
            quiz.questions.len()
        ),
    )
    .await?;
    ask_question(&bot, msg.chat.id, &quiz).await?;

    dialogue.update(State::Quiz { quiz }).await?;
    Ok(())
}

async fn ask_question(bot: &Bot, chat_id: ChatId, quiz: &quiz::Quiz) -> HandlerResult {
    let Some(question) = quiz.current_question() else {
        return Ok(());
    };

    let options = question
        .answers
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}) {}", quiz::Question::label(i), a.text))
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!(
        "Question {} of {}:\n{}\n\n{}",
        quiz.question_number() + 1,
        quiz.questions.len(),
        question.text,
        options
    );

    bot.send_message(chat_id, text)
        .reply_markup(KeyboardMarkup::new(
            question
                .answers
                .iter()
                .map(|a| vec![KeyboardButton::new(a.text.clone())])
                .collect::<Vec<_>>(),
        ))
        .await?;
    Ok(())
}

async fn run_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz: quiz::Quiz,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    let mut quiz = quiz;
    let Some(reply) = msg.text() else {
        bot.send_message(msg.chat.id, "Please pick one of the answers")
            .await?;
        return Ok(());
    };

    let question = quiz.current_question().cloned();
    match (quiz.answer(reply), question) {
        (Some(graded), _) if graded.correct => {
            bot.send_message(msg.chat.id, "✅ Correct!").await?;
        }
        (Some(graded), Some(question)) => {
            // Nice to have, so a failed typing indicator is ignored.
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
            let mut text = format!("❌ Wrong! The correct answer is {}.", graded.correct_answer);
            if let Some(explanation) = ctx.explain_mistake(&question, reply).await {
                text.push_str("\n\n");
                text.push_str(&explanation);
            }
            bot.send_message(msg.chat.id, text).await?;
        }
        _ => {}
    }

    if quiz.is_finished() {
        return finish_quiz(bot, dialogue, quiz, ctx, msg).await;
    }

    ask_question(&bot, msg.chat.id, &quiz).await?;
    dialogue.update(State::Quiz { quiz }).await?;
    Ok(())
}

async fn finish_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz: quiz::Quiz,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    let user = user_id(&msg);
    let entry = quiz.score_entry(now_timestamp());
    let correct = quiz.correct_count();
    let total = quiz.questions.len();

    let mut text = format!(
        "Quiz finished! You answered {} of {} correctly ({:.1}%).",
        correct, total, entry.score
    );
    let mistakes = quiz.mistakes();
    if mistakes.is_empty() {
        text.push_str("\n🎉 Perfect! You got all questions correct!");
    } else {
        text.push_str("\n\nReview:");
        for (question, given) in mistakes {
            let correct_answer = question
                .correct_answer()
                .map(|a| a.text.as_str())
                .unwrap_or_default();
            text.push_str(&format!(
                "\n• {}\n  Your answer: {}\n  Correct answer: {}",
                question.text, given, correct_answer
            ));
        }
    }

    match ctx.record_quiz_result(&user, &entry).await {
        Ok(Delivery::Synced) => {}
        Ok(Delivery::Queued) => {
            text.push_str("\n📦 Saved on this device, it will sync when the cloud is reachable.")
        }
        Err(e) => {
            log::error!("Failed to save quiz result for {}: {}", user, e);
            text.push_str("\n⚠️ Couldn't save this result.");
        }
    }

    let next = ctx.next_difficulty(&user).await;
    text.push_str(&format!("\nNext quiz difficulty: {}\n\nWhat would you like to do next?", next));

    bot.send_message(msg.chat.id, text)
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

async fn chat_with_assistant(
    bot: Bot,
    dialogue: QuizDialogue,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(BACK_TO_MENU) => show_menu(bot, dialogue, msg).await,
        Some(prompt) => {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
            let answer = ctx.ask_assistant(&user_id(&msg), prompt).await;
            bot.send_message(msg.chat.id, answer)
                .reply_markup(back_keyboard())
                .await?;
            Ok(())
        }
        None => {
            bot.send_message(msg.chat.id, "Please send your question as text")
                .await?;
            Ok(())
        }
    }
}

async fn receive_feedback(
    bot: Bot,
    dialogue: QuizDialogue,
    ctx: Context,
    msg: Message,
) -> HandlerResult {
    let feedback = match msg.text() {
        Some(BACK_TO_MENU) => return show_menu(bot, dialogue, msg).await,
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            bot.send_message(msg.chat.id, "Please type your feedback as text")
                .await?;
            return Ok(());
        }
    };

    let text = match ctx.submit_feedback(&user_id(&msg), feedback).await {
        Ok(Delivery::Synced) => "Thank you for your feedback!",
        Ok(Delivery::Queued) => "Thank you! Your feedback will be sent once we're back online.",
        Err(e) => {
            log::error!("Failed to store feedback: {}", e);
            "Sorry, your feedback couldn't be saved."
        }
    };
    bot.send_message(msg.chat.id, text)
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_keyed_by_sender_before_chat() {
        assert_eq!(user_key(Some(UserId(1001)), ChatId(-500)), "1001");
        assert_eq!(user_key(Some(UserId(1002)), ChatId(-500)), "1002");
        assert_eq!(user_key(None, ChatId(-500)), "-500");
    }

    #[test]
    fn chat_history_shows_prompt_and_answer() {
        assert_eq!(format_chat_history(&[]), "No chat history available yet.");

        let text = format_chat_history(&[ChatExchange {
            timestamp: "2024-03-01T10:15:30.000000Z".to_string(),
            prompt: "What is NCC?".to_string(),
            response: "A cadet corps.".to_string(),
        }]);
        assert!(text.contains("2024-03-01 10:15"));
        assert!(text.contains("You: What is NCC?\nAssistant: A cadet corps."));
    }
}
