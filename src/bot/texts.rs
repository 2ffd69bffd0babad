//! Static bot texts and keyboards.

use crate::channels::{InlineButton, Keyboard};
use crate::quiz::{PromptPayload, ResultPayload};

use super::action::callbacks;

/// Main menu button labels. Pressing one sends the label as text.
pub mod menu {
    pub const START_QUIZ: &str = "Start quiz";
    pub const HELP: &str = "Help";
    pub const CONTACTS: &str = "Contacts";
    pub const FEEDBACK: &str = "Leave feedback";
}

pub const GUARDIANSHIP_URL: &str = "https://moscowzoo.ru/about/guardianship";

pub const WELCOME: &str = "\
🐾 Welcome to the official Moscow Zoo bot! 🐾

I can help you:
• Find your totem animal with a short quiz
• Learn about the animal guardianship programme
• Get in touch with the zoo staff
• Leave feedback about your experience

Choose an action from the menu below or use a command:
/start - Main menu
/help - Command reference
/quiz - Start the quiz
/guardianship - About guardianship
/contact - Zoo contacts
/feedback - Leave feedback

Start with the quiz to meet your totem animal! 🦁";

pub const MAIN_MENU: &str = "Main menu. Choose an action:";

pub const HELP: &str = "\
🐾 Moscow Zoo bot commands:

/start - Main menu and greeting
/help - Show this reference
/quiz - Find your totem animal
/guardianship - Learn about animal guardianship
/contact - Zoo contacts
/feedback - Leave feedback about the bot

You can also use the menu buttons to navigate!";

pub const GUARDIANSHIP: &str = "\
❤️ To be a guardian is to help the animals you love.
Joining the Zoo Friends Club supports the care of our residents and is your \
personal contribution to preserving the Earth's biodiversity and to the \
development of our zoo.

Becoming a guardian is easy!
- Pick the animal you would like to support.
- Choose the donation amount (it can be split into instalments).
- We agree a short, simple contract. We promise 😇
- Done! Visit us to sign the contract and collect your guardian card.

✨ Press the button below to learn more about guardianship at the Moscow Zoo.";

pub const CONTACT: &str = "\
Contact us for more information:
Website: https://moscowzoo.ru/
Telegram: https://t.me/Moscowzoo_official
YouTube: https://www.youtube.com/@Moscowzooofficial
VK: https://vk.com/moscow_zoo
Odnoklassniki: https://ok.ru/moscowzoo
Phone: +7 499 252 29 51
You can message a staff member with the button below.";

pub const ASK_FEEDBACK: &str = "Please leave your feedback:";
pub const ASK_STAFF_MESSAGE: &str = "Type your message:";
pub const FEEDBACK_FAILED: &str = "Sorry, we could not save your message.";
pub const CHOOSE_ACTION: &str = "Choose an action:";
pub const SHARE_PROMPT: &str = "Share your result on social networks:";
pub const UNRECOGNIZED: &str = "I did not understand that. Use the menu or /help.";

const RESULT_GUARDIANSHIP_NOTE: &str = "\
You can become a guardian of this animal at the Moscow Zoo. \
It helps us care for your totem animal. \
Press the button below to learn more.";

/// Confirmation after a message was stored.
pub fn feedback_saved(text: &str) -> String {
    format!("Your message '{text}' has been sent.")
}

/// Persistent main menu keyboard.
pub fn main_menu() -> Keyboard {
    Keyboard::Menu(vec![
        vec![menu::START_QUIZ.to_string(), menu::HELP.to_string()],
        vec![menu::CONTACTS.to_string(), menu::FEEDBACK.to_string()],
    ])
}

/// Question text with a header and one answer button per row.
pub fn prompt_text(prompt: &PromptPayload) -> String {
    format!(
        "Question {} of {}\n\n{}",
        prompt.question_index + 1,
        prompt.question_count,
        prompt.text
    )
}

pub fn prompt_keyboard(prompt: &PromptPayload) -> Keyboard {
    Keyboard::Inline(
        prompt
            .options
            .iter()
            .map(|option| vec![InlineButton::callback(&option.label, option.selector.token())])
            .collect(),
    )
}

/// Caption for the result message. `with_image` is false when the image is
/// missing and the result goes out as plain text.
pub fn result_caption(result: &ResultPayload, with_image: bool) -> String {
    let headline = if with_image {
        format!("Your totem animal: {}", result.name)
    } else {
        format!("Your totem animal: {}. Image unavailable.", result.name)
    };
    format!(
        "{headline}\n\n{}\n\n{RESULT_GUARDIANSHIP_NOTE}",
        result.description
    )
}

/// Retry and guardianship buttons shown after a result.
pub fn result_actions() -> Keyboard {
    Keyboard::Inline(vec![
        vec![InlineButton::callback("Try again?", callbacks::RETRY)],
        vec![InlineButton::callback(
            "❤️ Guardianship at the Moscow Zoo",
            callbacks::LEARN_MORE,
        )],
    ])
}

pub fn guardianship_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::url("Learn more", GUARDIANSHIP_URL)]])
}

pub fn contact_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::callback(
        "Send a message",
        callbacks::SEND_MESSAGE,
    )]])
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::channels::ButtonTarget;
    use crate::quiz::{PromptOption, Selector};

    fn prompt() -> PromptPayload {
        PromptPayload {
            question_index: 1,
            question_count: 5,
            text: "Which climate suits you best?".into(),
            options: vec![
                PromptOption {
                    label: "Hot savanna".into(),
                    selector: Selector::new(1, 0),
                },
                PromptOption {
                    label: "Snowy taiga".into(),
                    selector: Selector::new(1, 1),
                },
            ],
        }
    }

    fn result() -> ResultPayload {
        ResultPayload {
            category_id: "owl".into(),
            name: "Eagle Owl".into(),
            image: Some(PathBuf::from("assets/owl.jpg")),
            description: "Quiet and observant.".into(),
        }
    }

    #[test]
    fn prompt_text_is_one_based() {
        assert_eq!(
            prompt_text(&prompt()),
            "Question 2 of 5\n\nWhich climate suits you best?"
        );
    }

    #[test]
    fn prompt_keyboard_one_button_per_row() {
        let Keyboard::Inline(rows) = prompt_keyboard(&prompt()) else {
            panic!("expected inline keyboard");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].text, "Snowy taiga");
        assert_eq!(rows[1][0].target, ButtonTarget::Callback("q:1:1".into()));
    }

    #[test]
    fn result_caption_variants() {
        let with = result_caption(&result(), true);
        assert!(with.starts_with("Your totem animal: Eagle Owl\n"));
        assert!(with.contains("Quiet and observant."));
        assert!(with.contains("guardian"));

        let without = result_caption(&result(), false);
        assert!(without.starts_with("Your totem animal: Eagle Owl. Image unavailable."));
    }

    #[test]
    fn main_menu_labels_match_menu_constants() {
        let Keyboard::Menu(rows) = main_menu() else {
            panic!("expected menu keyboard");
        };
        let labels: Vec<&str> = rows.iter().flatten().map(String::as_str).collect();
        assert_eq!(
            labels,
            vec![menu::START_QUIZ, menu::HELP, menu::CONTACTS, menu::FEEDBACK]
        );
    }

    #[test]
    fn result_actions_point_at_known_callbacks() {
        let Keyboard::Inline(rows) = result_actions() else {
            panic!("expected inline keyboard");
        };
        assert_eq!(rows[0][0].target, ButtonTarget::Callback(callbacks::RETRY.into()));
        assert_eq!(
            rows[1][0].target,
            ButtonTarget::Callback(callbacks::LEARN_MORE.into())
        );
    }
}
