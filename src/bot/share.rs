//! Social share links for quiz results.

use reqwest::Url;

use crate::channels::{InlineButton, Keyboard};

/// A share button target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub label: &'static str,
    pub url: String,
}

/// Share text for a result.
pub fn share_text(animal: &str) -> String {
    format!("My totem animal is {animal}! Find yours with this bot!")
}

/// Build Telegram, VK, Odnoklassniki and WhatsApp share URLs.
///
/// Parameters are form-urlencoded (spaces become `+`).
pub fn share_links(bot_link: &str, animal: &str) -> Vec<ShareLink> {
    let text = share_text(animal);
    let whatsapp_text = format!("{text} {bot_link}");

    let targets: [(&'static str, &str, [(&str, &str); 2]); 3] = [
        (
            "Share on Telegram",
            "https://t.me/share/url",
            [("url", bot_link), ("text", text.as_str())],
        ),
        (
            "Share on VK",
            "https://vk.com/share.php",
            [("url", bot_link), ("title", text.as_str())],
        ),
        (
            "Share on Odnoklassniki",
            "https://connect.ok.ru/offer",
            [("url", bot_link), ("title", text.as_str())],
        ),
    ];

    let mut links: Vec<ShareLink> = targets
        .into_iter()
        .filter_map(|(label, base, params)| build(label, base, &params))
        .collect();
    links.extend(build(
        "Share on WhatsApp",
        "https://api.whatsapp.com/send",
        &[("text", whatsapp_text.as_str())],
    ));
    links
}

fn build(label: &'static str, base: &str, params: &[(&str, &str)]) -> Option<ShareLink> {
    match Url::parse_with_params(base, params) {
        Ok(url) => Some(ShareLink {
            label,
            url: url.into(),
        }),
        Err(e) => {
            tracing::warn!(base, "Failed to build share link: {e}");
            None
        }
    }
}

/// One URL button per network.
pub fn share_keyboard(bot_link: &str, animal: &str) -> Keyboard {
    Keyboard::Inline(
        share_links(bot_link, animal)
            .into_iter()
            .map(|link| vec![InlineButton::url(link.label, link.url)])
            .collect(),
    )
}
